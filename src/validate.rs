//! Payload validation against entity metadata.
//!
//! Create payloads run every declared property through the required and
//! format checks; update payloads only check the fields they carry.
//! Failures surface as the 41xx property errors.

use crate::error::{SqlectError, SqlectResult};
use crate::schema::Prop;
use crate::value::{Value, ValueMap};

/// Strict required check: a required property whose value is absent or
/// blank fails, defaults and generators notwithstanding. Used for updates,
/// where a present-but-blank value would wipe the column.
pub fn check_require(prop: &Prop, value: Option<&Value>) -> SqlectResult<()> {
    if let Some(column) = &prop.column {
        if column.required && value.map_or(true, Value::is_blank) {
            return Err(SqlectError::missing(&prop.name));
        }
    }
    Ok(())
}

/// Required check for inserts. Blank is tolerated when the store or the
/// metadata can supply the value: auto-increment keys, column defaults,
/// validation defaults, and generate strategies.
pub fn check_required(prop: &Prop, value: Option<&Value>) -> SqlectResult<()> {
    let Some(column) = &prop.column else {
        return Ok(());
    };
    if !column.required || value.is_some_and(|v| !v.is_blank()) {
        return Ok(());
    }
    if column.auto_increment {
        return Ok(());
    }
    if column.default.as_deref().is_some_and(|d| !d.is_empty()) {
        return Ok(());
    }
    if let Some(check) = &prop.check {
        if check.default.as_deref().is_some_and(|d| !d.is_empty())
            || check.generate.as_deref().is_some_and(|g| !g.is_empty())
        {
            return Ok(());
        }
    }
    Err(SqlectError::missing(&prop.name))
}

/// Format check. The validation tag's `format` wins; otherwise `bool` and
/// integer column types imply one. Numeric values also honor the min/max
/// facets; a facet that fails to parse compares as 0.
pub fn check_format(prop: &Prop, value: &Value) -> SqlectResult<()> {
    let mut format = prop
        .check
        .as_ref()
        .and_then(|c| c.format.as_deref())
        .unwrap_or("");
    if format.is_empty() {
        if let Some(column) = &prop.column {
            format = match column.sql_type.as_str() {
                "bool" => "bool",
                "int" | "bigint" => "number",
                _ => "",
            };
        }
    }
    match format {
        "bool" => {
            let src = value.as_string();
            if src != "1" && src != "0" && src != "true" && src != "false" {
                return Err(SqlectError::invalid(&prop.name, "must be 1/0 or true/false"));
            }
        }
        "number" => {
            let src: i64 = value
                .as_string()
                .parse()
                .map_err(|_| SqlectError::not_number(&prop.name))?;
            if let Some(check) = &prop.check {
                if let Some(min) = check.min.as_deref().filter(|m| !m.is_empty()) {
                    if src < min.parse().unwrap_or(0) {
                        return Err(SqlectError::invalid(
                            &prop.name,
                            format!("must not be less than {min}"),
                        ));
                    }
                }
                if let Some(max) = check.max.as_deref().filter(|m| !m.is_empty()) {
                    if src > max.parse().unwrap_or(0) {
                        return Err(SqlectError::invalid(
                            &prop.name,
                            format!("must not be greater than {max}"),
                        ));
                    }
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Validate a create payload. Every declared property runs the insert
/// required check; the values actually supplied also run the format check.
pub fn verify_create(props: &[Prop], data: &ValueMap) -> SqlectResult<()> {
    for prop in props {
        let value = data.get(&prop.name);
        check_required(prop, value)?;
        if let Some(v) = value {
            if !v.is_blank() {
                check_format(prop, v)?;
            }
        }
    }
    Ok(())
}

/// Validate an update payload. Only the fields present in the payload are
/// checked; required fields may not be blanked out.
pub fn verify_update(props: &[Prop], data: &ValueMap) -> SqlectResult<()> {
    if data.is_empty() {
        return Ok(());
    }
    for prop in props {
        let Some(value) = data.get(&prop.name) else {
            continue;
        };
        check_require(prop, Some(value))?;
        if !value.is_blank() {
            check_format(prop, value)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{parse_check_tag, parse_column_tag};
    use crate::value::ValueMap;

    fn prop(name: &str, column_tag: &str, check_tag: &str) -> Prop {
        Prop {
            name: name.to_string(),
            column: parse_column_tag(column_tag),
            check: parse_check_tag(check_tag),
        }
    }

    fn user_props() -> Vec<Prop> {
        vec![
            prop(
                "Id",
                "column:id;type:bigint;primaryKey;autoIncrement:true",
                "",
            ),
            prop("LoginName", "column:login_name;type:varchar(60);not null", ""),
            prop(
                "Sort",
                "column:sort;type:bigint;not null;default:10000",
                "min:1;max:100000",
            ),
            prop("Enable", "column:enable;type:int", "format:bool"),
            prop("Remark", "column:remark;type:varchar(255)", ""),
        ]
    }

    #[test]
    fn test_create_requires_blank_fields() {
        let props = user_props();
        let data: ValueMap = [("loginname", "")].into_iter().collect();
        let err = verify_create(&props, &data).unwrap_err();
        assert!(matches!(err, SqlectError::PropMissing { ref field } if field == "LoginName"));
        assert_eq!(err.code(), 4100);
    }

    #[test]
    fn test_create_exemptions() {
        // Id is auto-increment, Sort has a column default: both may stay
        // blank even though they are required.
        let props = user_props();
        let data: ValueMap = [("LoginName", "admin")].into_iter().collect();
        assert!(verify_create(&props, &data).is_ok());
    }

    #[test]
    fn test_create_checks_format_of_supplied_values() {
        let props = user_props();

        let data: ValueMap = [("LoginName", "admin"), ("Sort", "abc")]
            .into_iter()
            .collect();
        let err = verify_create(&props, &data).unwrap_err();
        assert!(matches!(err, SqlectError::PropNotNumber { ref field } if field == "Sort"));

        let data: ValueMap = [("LoginName", "admin"), ("Enable", "yes")]
            .into_iter()
            .collect();
        let err = verify_create(&props, &data).unwrap_err();
        assert_eq!(err.code(), 4120);
    }

    #[test]
    fn test_number_min_max() {
        let p = prop("Sort", "column:sort;type:bigint", "min:1;max:100000");
        assert!(check_format(&p, &Value::from(1)).is_ok());
        assert!(check_format(&p, &Value::from(100000)).is_ok());
        assert!(check_format(&p, &Value::from(0)).is_err());
        assert!(check_format(&p, &Value::from(100001)).is_err());
        // Numeric strings count as numbers.
        assert!(check_format(&p, &Value::from("42")).is_ok());
    }

    #[test]
    fn test_unparseable_facet_compares_as_zero() {
        let p = prop("Sort", "column:sort;type:bigint", "min:abc");
        assert!(check_format(&p, &Value::from(1)).is_ok());
        assert!(check_format(&p, &Value::from(-1)).is_err());
    }

    #[test]
    fn test_bool_literals() {
        let p = prop("Enable", "column:enable;type:bool", "");
        for ok in ["1", "0", "true", "false"] {
            assert!(check_format(&p, &Value::from(ok)).is_ok());
        }
        assert!(check_format(&p, &Value::from(true)).is_ok());
        assert!(check_format(&p, &Value::from(1)).is_ok());
        assert!(check_format(&p, &Value::from("yes")).is_err());
    }

    #[test]
    fn test_update_checks_only_present_fields() {
        let props = user_props();

        // LoginName absent: no complaint.
        let data: ValueMap = [("Remark", "hello")].into_iter().collect();
        assert!(verify_update(&props, &data).is_ok());

        // Blanking a required field fails even though it has exemptions
        // on the create path.
        let data: ValueMap = [("Sort", "")].into_iter().collect();
        let err = verify_update(&props, &data).unwrap_err();
        assert!(matches!(err, SqlectError::PropMissing { ref field } if field == "Sort"));

        // Present values still run the format check.
        let data: ValueMap = [("Sort", "abc")].into_iter().collect();
        assert!(verify_update(&props, &data).is_err());

        let data: ValueMap = ValueMap::new();
        assert!(verify_update(&props, &data).is_ok());
    }
}
