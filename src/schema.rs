//! Entity metadata: declared field mappings parsed into property descriptors.
//!
//! An [`EntityDef`] is registered once at startup and carries, per field, a
//! column tag (`column:id;type:bigint;primaryKey;autoIncrement:true`) and a
//! validation tag (`min:1;max:100000;format:number`). Parsing runs once per
//! entity and is memoized process-wide.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// A declared entity: table name plus ordered field mappings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDef {
    pub table: String,
    pub fields: Vec<FieldDef>,
}

/// One field declaration: logical name plus its two raw tag strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub column_tag: String,
    pub check_tag: String,
}

impl EntityDef {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: Vec::new(),
        }
    }

    /// Declare a field with its column tag and validation tag.
    pub fn field(
        mut self,
        name: impl Into<String>,
        column_tag: impl Into<String>,
        check_tag: impl Into<String>,
    ) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            column_tag: column_tag.into(),
            check_tag: check_tag.into(),
        });
        self
    }
}

/// Column-mapping facets parsed from a field's column tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub column: String,
    pub sql_type: String,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub required: bool,
    pub default: Option<String>,
}

/// Validation facets parsed from a field's validation tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckMeta {
    pub min: Option<String>,
    pub max: Option<String>,
    pub min_len: Option<String>,
    pub max_len: Option<String>,
    pub format: Option<String>,
    pub pattern: Option<String>,
    pub default: Option<String>,
    pub generate: Option<String>,
    pub enumeration: Vec<String>,
}

/// One extracted property: field name plus its optional facet groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prop {
    pub name: String,
    pub column: Option<ColumnMeta>,
    pub check: Option<CheckMeta>,
}

impl Prop {
    pub fn is_pk(&self) -> bool {
        self.column.as_ref().map(|c| c.primary_key).unwrap_or(false)
    }

    pub fn is_auto_increment(&self) -> bool {
        self.column
            .as_ref()
            .map(|c| c.auto_increment)
            .unwrap_or(false)
    }

    pub fn is_required(&self) -> bool {
        self.column.as_ref().map(|c| c.required).unwrap_or(false)
    }
}

static PROP_CACHE: Lazy<RwLock<HashMap<String, Arc<Vec<Prop>>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Extract the property list for an entity, memoized by table name.
///
/// Population is get-then-set: two racing callers may both parse, which is
/// tolerated because the result is deterministic.
pub fn props(def: &EntityDef) -> Arc<Vec<Prop>> {
    if let Some(found) = PROP_CACHE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&def.table)
    {
        return Arc::clone(found);
    }

    let computed: Arc<Vec<Prop>> = Arc::new(
        def.fields
            .iter()
            .map(|f| Prop {
                name: f.name.clone(),
                column: parse_column_tag(&f.column_tag),
                check: parse_check_tag(&f.check_tag),
            })
            .collect(),
    );
    PROP_CACHE
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(def.table.clone(), Arc::clone(&computed));
    computed
}

/// First primary-key property, if any.
pub fn pk(props: &[Prop]) -> Option<&Prop> {
    props.iter().find(|p| p.is_pk())
}

/// All primary-key properties.
pub fn pks(props: &[Prop]) -> Vec<&Prop> {
    props.iter().filter(|p| p.is_pk()).collect()
}

/// Parse a column tag. Clauses are `;`-separated, each either a bare
/// keyword (`primaryKey`, which also marks the field required; `not null`;
/// `autoIncrement`) or `key:value`. Clauses with more than one `:` are
/// ignored. A tag that never resolves a column name yields no mapping.
pub fn parse_column_tag(tag: &str) -> Option<ColumnMeta> {
    let mut meta = ColumnMeta::default();
    for clause in tag.split(';') {
        let parts: Vec<&str> = clause.split(':').collect();
        match parts.as_slice() {
            [flag] => match *flag {
                "autoIncrement" => meta.auto_increment = true,
                "not null" => meta.required = true,
                "primaryKey" => {
                    meta.primary_key = true;
                    meta.required = true;
                }
                _ => {}
            },
            [key, value] => match *key {
                // type tokens carry no length suffix: varchar(60) -> varchar
                "type" => {
                    meta.sql_type = match value.find('(') {
                        Some(i) => value[..i].to_string(),
                        None => value.to_string(),
                    }
                }
                "column" => meta.column = value.to_string(),
                "default" => meta.default = Some(value.to_string()),
                "autoIncrement" => meta.auto_increment = *value == "true",
                _ => {}
            },
            _ => {}
        }
    }
    if meta.column.is_empty() {
        return None;
    }
    Some(meta)
}

/// Parse a validation tag. An empty tag means no validation facets.
pub fn parse_check_tag(tag: &str) -> Option<CheckMeta> {
    if tag.is_empty() {
        return None;
    }
    let mut meta = CheckMeta::default();
    for clause in tag.split(';') {
        let parts: Vec<&str> = clause.split(':').collect();
        match parts.as_slice() {
            ["generate"] => meta.generate = Some("generate".to_string()),
            [key, value] => match *key {
                "min" => meta.min = Some(value.to_string()),
                "max" => meta.max = Some(value.to_string()),
                "minLen" => meta.min_len = Some(value.to_string()),
                "maxLen" => meta.max_len = Some(value.to_string()),
                "format" => meta.format = Some(value.to_string()),
                "pattern" => meta.pattern = Some(value.to_string()),
                "default" => meta.default = Some(value.to_string()),
                "generate" => meta.generate = Some(value.to_string()),
                "enumeration" => {
                    meta.enumeration = value
                        .split(',')
                        .filter(|e| !e.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                _ => {}
            },
            _ => {}
        }
    }
    Some(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn algorithm() -> EntityDef {
        EntityDef::new("T_TEST_ALGORITHM")
            .field(
                "Id",
                "column:id;type:bigint;primaryKey;autoIncrement:true;",
                "",
            )
            .field("Name", "column:name;type:varchar(60);not null", "")
            .field(
                "Sort",
                "column:sort;type:bigint;not null;default:10000",
                "min:1;max:100000",
            )
            .field("Enable", "column:enable;type:int", "format:bool")
            .field("Remark", "column:remark;type:varchar(255)", "default:测试")
            .field("Skipped", "type:varchar(20)", "")
    }

    #[test]
    fn test_column_tag_parsing() {
        let props = props(&algorithm());

        let id = props[0].column.as_ref().unwrap();
        assert_eq!(id.column, "id");
        assert_eq!(id.sql_type, "bigint");
        assert!(id.primary_key && id.auto_increment && id.required);

        let name = props[1].column.as_ref().unwrap();
        assert_eq!(name.sql_type, "varchar");
        assert!(name.required && !name.primary_key);

        let sort = props[2].column.as_ref().unwrap();
        assert_eq!(sort.default.as_deref(), Some("10000"));
    }

    #[test]
    fn test_missing_column_means_no_mapping() {
        assert_eq!(parse_column_tag("type:varchar(20)"), None);
        assert_eq!(parse_column_tag(""), None);
    }

    #[test]
    fn test_check_tag_parsing() {
        let meta = parse_check_tag("min:1;max:100000").unwrap();
        assert_eq!(meta.min.as_deref(), Some("1"));
        assert_eq!(meta.max.as_deref(), Some("100000"));

        assert_eq!(parse_check_tag(""), None);

        let bare = parse_check_tag("generate").unwrap();
        assert_eq!(bare.generate.as_deref(), Some("generate"));

        let en = parse_check_tag("enumeration:a,b,,c").unwrap();
        assert_eq!(en.enumeration, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_pk_selection() {
        let def = algorithm();
        let props = props(&def);
        assert_eq!(pk(&props).unwrap().name, "Id");
        assert_eq!(pks(&props).len(), 1);
    }

    #[test]
    fn test_props_cached_by_table_identity() {
        let def = EntityDef::new("T_CACHE_PROBE").field("Id", "column:id;primaryKey", "");
        let first = props(&def);
        let second = props(&def);
        assert!(Arc::ptr_eq(&first, &second));
    }
}
