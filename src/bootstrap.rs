//! Existence-gated database create/drop probes.
//!
//! Configuration-level plumbing, not part of the composition core: given a
//! driver connected to the dialect's maintenance endpoint, probe for the
//! target database and issue a conditional create or drop. Creates are
//! idempotent; drops only run when the probe finds the target.

use tracing::info;

use crate::config::DbOptions;
use crate::dialect::Dialect;
use crate::driver::Driver;
use crate::error::{SqlectError, SqlectResult};
use crate::row::Row;

const UXDB_PROBE: &str = "SELECT datname FROM ux_database";
const DAMENG_PROBE: &str = "select tablespace_name \"datname\" from dba_data_files";
const VASTBASE_PROBE: &str = "SELECT datname FROM pg_database";

/// Case-insensitive scan of probe results for `key == value`.
pub fn contains_kv(rows: &[Row], key: &str, value: &str) -> bool {
    rows.iter()
        .any(|row| row.get(key).is_some_and(|v| v.as_string() == value))
}

/// Create the configured database if it does not exist.
pub async fn create_database(driver: &dyn Driver, options: &DbOptions) -> SqlectResult<()> {
    let db = options.database.as_str();
    match options.dialect {
        Dialect::MySql => {
            driver
                .execute(&format!("CREATE DATABASE IF NOT EXISTS {db}"), &[])
                .await?;
        }
        Dialect::UxDb => {
            let rows = driver.query(UXDB_PROBE, &[]).await?;
            if contains_kv(&rows, "datname", db) {
                return Ok(());
            }
            driver
                .execute(&format!("CREATE DATABASE \"{db}\""), &[])
                .await?;
        }
        Dialect::Dameng => {
            let rows = driver.query(DAMENG_PROBE, &[]).await?;
            if contains_kv(&rows, "datname", db) {
                return Ok(());
            }
            let password = options
                .password()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| {
                    SqlectError::Config("no password in the data source name".into())
                })?;
            driver
                .execute(
                    &format!(
                        "CREATE tablespace \"{db}\" datafile '/dm/data/DMDB/{db}.DBF' \
                         size 128 autoextend on maxsize 67108863 CACHE = NORMAL"
                    ),
                    &[],
                )
                .await?;
            driver
                .execute(
                    &format!(
                        "CREATE USER \"{db}\" IDENTIFIED BY {password} HASH WITH SHA512 NO SALT \
                         PASSWORD_POLICY 2 ENCRYPT BY {password} \
                         LIMIT FAILED_LOGIN_ATTEMPS 3, PASSWORD_LOCK_TIME 1, PASSWORD_GRACE_TIME 10 \
                         DEFAULT TABLESPACE \"{db}\" DEFAULT INDEX TABLESPACE \"{db}\""
                    ),
                    &[],
                )
                .await?;
            driver
                .execute(&format!("grant \"DBA\" to \"{db}\""), &[])
                .await?;
        }
        Dialect::Vastbase => {
            let rows = driver.query(VASTBASE_PROBE, &[]).await?;
            if contains_kv(&rows, "datname", db) {
                return Ok(());
            }
            let owner = options
                .username()
                .filter(|u| !u.is_empty())
                .ok_or_else(|| {
                    SqlectError::Config("no username in the data source name".into())
                })?;
            driver
                .execute(
                    &format!(
                        "CREATE DATABASE \"{db}\" WITH OWNER = {owner} ENCODING = 'UTF-8' \
                         TEMPLATE = template0 DBCOMPATIBILITY = 'B' TABLESPACE = pg_default \
                         LC_COLLATE = 'en_US.utf8' LC_CTYPE = 'en_US.utf8' CONNECTION LIMIT = -1"
                    ),
                    &[],
                )
                .await?;
        }
    }
    info!(database = db, dialect = %options.dialect, "database bootstrap complete");
    Ok(())
}

/// Drop the configured database if the probe finds it.
pub async fn drop_database(driver: &dyn Driver, options: &DbOptions) -> SqlectResult<()> {
    let db = options.database.as_str();
    match options.dialect {
        Dialect::MySql => {
            driver
                .execute(&format!("DROP DATABASE IF EXISTS {db}"), &[])
                .await?;
        }
        Dialect::UxDb => {
            let rows = driver.query(UXDB_PROBE, &[]).await?;
            if !contains_kv(&rows, "datname", db) {
                return Ok(());
            }
            driver
                .execute(&format!("DROP DATABASE \"{db}\""), &[])
                .await?;
        }
        Dialect::Dameng => {
            let rows = driver.query(DAMENG_PROBE, &[]).await?;
            if !contains_kv(&rows, "datname", db) {
                return Ok(());
            }
            driver
                .execute(&format!("DROP USER \"{db}\" cascade"), &[])
                .await?;
            driver
                .execute(&format!("DROP tablespace \"{db}\""), &[])
                .await?;
        }
        Dialect::Vastbase => {
            let rows = driver.query(VASTBASE_PROBE, &[]).await?;
            if !contains_kv(&rows, "datname", db) {
                return Ok(());
            }
            driver
                .execute(&format!("DROP DATABASE \"{db}\""), &[])
                .await?;
        }
    }
    info!(database = db, dialect = %options.dialect, "database dropped");
    Ok(())
}
