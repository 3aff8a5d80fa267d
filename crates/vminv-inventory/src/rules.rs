//! Property rules
//!
//! A rule names a dotted attribute path on a VM. The resolved value becomes a
//! hostvar, may place the VM in a group, and may exclude the VM from the
//! inventory altogether.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use vminv_session::{AttributeLookupError, InventoryObject};

/// Rule as written in configuration: a bare path or a full record
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RuleSpec {
    Path(String),
    Full {
        name: String,
        #[serde(default)]
        group: bool,
        #[serde(default)]
        group_alias: Option<String>,
        #[serde(default)]
        exclude_if: Option<Value>,
    },
}

/// Property extraction rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RuleSpec")]
pub struct PropertyRule {
    /// Dotted attribute path, e.g. `config.guestId`
    pub name: String,
    /// Place the VM in a group derived from the value
    pub group: bool,
    /// Fixed group name instead of the value
    pub group_alias: Option<String>,
    /// Exclude the VM when the value equals this
    pub exclude_if: Option<Value>,
}

impl From<RuleSpec> for PropertyRule {
    fn from(spec: RuleSpec) -> Self {
        match spec {
            RuleSpec::Path(name) => PropertyRule::new(name),
            RuleSpec::Full {
                name,
                group,
                group_alias,
                exclude_if,
            } => PropertyRule {
                name,
                group,
                group_alias,
                exclude_if,
            },
        }
    }
}

impl PropertyRule {
    /// Create a plain hostvar rule
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: false,
            group_alias: None,
            exclude_if: None,
        }
    }

    /// Enable grouping
    #[must_use]
    pub fn grouped(mut self) -> Self {
        self.group = true;
        self
    }

    /// Group under a fixed name
    #[must_use]
    pub fn with_group_alias(mut self, alias: impl Into<String>) -> Self {
        self.group = true;
        self.group_alias = Some(alias.into());
        self
    }

    /// Exclude VMs whose value equals `value`
    #[must_use]
    pub fn excluding(mut self, value: impl Into<Value>) -> Self {
        self.exclude_if = Some(value.into());
        self
    }

    /// Hostvar key: last path segment, lower-cased
    #[must_use]
    pub fn hostvar_key(&self) -> String {
        self.name
            .rsplit('.')
            .next()
            .unwrap_or(&self.name)
            .to_lowercase()
    }

    fn matches_exclusion(&self, value: &Value) -> bool {
        match (&self.exclude_if, value) {
            (None, _) => false,
            (Some(Value::String(excluded)), Value::String(actual)) => {
                excluded.to_lowercase() == actual.to_lowercase()
            }
            // 1 and 1.0 are the same exclusion value
            (Some(Value::Number(excluded)), Value::Number(actual)) => {
                excluded == actual || excluded.as_f64() == actual.as_f64()
            }
            (Some(excluded), actual) => excluded == actual,
        }
    }
}

/// Sort rules so exclusion rules run first
///
/// Rules with `exclude_if` precede rules without it; among exclusion rules the
/// order follows the exclusion value. The sort is stable.
pub fn sort_rules(rules: &mut [PropertyRule]) {
    rules.sort_by(|a, b| match (&a.exclude_if, &b.exclude_if) {
        (Some(x), Some(y)) => compare_values(x, y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Lower-case textual values, leave everything else untouched
#[must_use]
pub fn normalize_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.to_lowercase()),
        other => other,
    }
}

/// Render a value as a group name
fn group_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_lowercase(),
        Value::Null => "none".to_string(),
        other => other.to_string(),
    }
}

/// Proposal produced by evaluating rules against one object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOutcome {
    /// Object matched an exclusion rule
    pub excluded: bool,
    /// Variables to merge into the object's hostvars
    pub hostvars: Map<String, Value>,
    /// Groups the object joins
    pub groups: Vec<String>,
}

impl RuleOutcome {
    fn excluded() -> Self {
        Self {
            excluded: true,
            ..Self::default()
        }
    }
}

/// Evaluate sorted rules against an object
///
/// Nothing is written to the inventory; the caller commits the returned
/// outcome. An excluded outcome carries no hostvars or groups.
///
/// # Errors
/// Returns `AttributeLookupError` if a rule path does not resolve
pub fn evaluate(
    rules: &[PropertyRule],
    object: &dyn InventoryObject,
) -> Result<RuleOutcome, AttributeLookupError> {
    let mut outcome = RuleOutcome::default();

    for rule in rules {
        let value = object.resolve_path(&rule.name)?;

        if rule.matches_exclusion(&value) {
            debug!(object = object.name(), rule = %rule.name, "excluded by property rule");
            return Ok(RuleOutcome::excluded());
        }

        if rule.group {
            let group = match &rule.group_alias {
                Some(alias) => alias.to_lowercase(),
                None => group_label(&value),
            };
            // booleans join only when true
            let joins = match &value {
                Value::Bool(flag) => *flag,
                _ => true,
            };
            if joins && !outcome.groups.contains(&group) {
                outcome.groups.push(group);
            }
        }

        outcome
            .hostvars
            .insert(rule.hostvar_key(), normalize_value(value));
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vminv_session::VirtualMachine;

    fn vm(properties: Value) -> VirtualMachine {
        VirtualMachine::new("web01").with_properties(properties)
    }

    #[test]
    fn test_parse_shorthand_and_record() {
        let rules: Vec<PropertyRule> = serde_json::from_value(json!([
            "config.guestId",
            { "name": "config.template", "group": true, "group_alias": "templates" },
            { "name": "runtime.powerState", "exclude_if": "poweredOff" }
        ]))
        .unwrap();

        assert_eq!(rules[0], PropertyRule::new("config.guestId"));
        assert_eq!(
            rules[1],
            PropertyRule::new("config.template").with_group_alias("templates")
        );
        assert_eq!(
            rules[2],
            PropertyRule::new("runtime.powerState").excluding("poweredOff")
        );
    }

    #[test]
    fn test_sort_puts_exclusions_first() {
        let mut rules = vec![
            PropertyRule::new("b").grouped(),
            PropertyRule::new("c").excluding("z"),
            PropertyRule::new("d"),
            PropertyRule::new("a").excluding("x"),
        ];
        sort_rules(&mut rules);

        let names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a", "c", "b", "d"]);
    }

    #[test]
    fn test_sort_mixed_exclusion_types() {
        let mut rules = vec![
            PropertyRule::new("s").excluding("x"),
            PropertyRule::new("n").excluding(3),
            PropertyRule::new("f").excluding(false),
        ];
        sort_rules(&mut rules);

        let names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["f", "n", "s"]);
    }

    #[test]
    fn test_exclusion_discards_earlier_results() {
        let mut rules = vec![
            PropertyRule::new("b").grouped(),
            PropertyRule::new("a").excluding("x"),
        ];
        sort_rules(&mut rules);

        let outcome = evaluate(&rules, &vm(json!({ "a": "X", "b": "grp" }))).unwrap();
        assert!(outcome.excluded);
        assert!(outcome.hostvars.is_empty());
        assert!(outcome.groups.is_empty());
    }

    #[test]
    fn test_exclusion_exact_for_non_text() {
        let rules = vec![PropertyRule::new("config.template").excluding(false)];

        let textual = evaluate(&rules, &vm(json!({ "config": { "template": "False" } }))).unwrap();
        assert!(!textual.excluded);

        let boolean = evaluate(&rules, &vm(json!({ "config": { "template": false } }))).unwrap();
        assert!(boolean.excluded);
    }

    #[test]
    fn test_numeric_exclusion_ignores_representation() {
        let rules = vec![PropertyRule::new("config.hardware.numCPU").excluding(1)];

        let float = evaluate(&rules, &vm(json!({ "config": { "hardware": { "numCPU": 1.0 } } })));
        assert!(float.unwrap().excluded);

        let other = evaluate(&rules, &vm(json!({ "config": { "hardware": { "numCPU": 2 } } })));
        assert!(!other.unwrap().excluded);

        let text = evaluate(&rules, &vm(json!({ "config": { "hardware": { "numCPU": "1" } } })));
        assert!(!text.unwrap().excluded);
    }

    #[test]
    fn test_boolean_grouping() {
        let rules = vec![PropertyRule::new("config.template").with_group_alias("templates")];

        let no = evaluate(&rules, &vm(json!({ "config": { "template": false } }))).unwrap();
        assert!(no.groups.is_empty());
        assert_eq!(no.hostvars["template"], json!(false));

        let yes = evaluate(&rules, &vm(json!({ "config": { "template": true } }))).unwrap();
        assert_eq!(yes.groups, ["templates"]);
    }

    #[test]
    fn test_value_grouping_and_hostvars() {
        let rules = vec![
            PropertyRule::new("config.guestId").grouped(),
            PropertyRule::new("config.numCpu").grouped(),
            PropertyRule::new("guest.ipAddress"),
        ];
        let outcome = evaluate(
            &rules,
            &vm(json!({
                "config": { "guestId": "centos64Guest", "numCpu": 4 },
                "guest": { "ipAddress": null }
            })),
        )
        .unwrap();

        assert!(!outcome.excluded);
        assert_eq!(outcome.groups, ["centos64guest", "4"]);
        assert_eq!(outcome.hostvars["guestid"], json!("centos64guest"));
        assert_eq!(outcome.hostvars["numcpu"], json!(4));
        assert_eq!(outcome.hostvars["ipaddress"], Value::Null);
    }

    #[test]
    fn test_unresolvable_path() {
        let rules = vec![PropertyRule::new("config.missing")];
        let err = evaluate(&rules, &vm(json!({ "config": {} }))).unwrap_err();
        assert_eq!(err.segment, "missing");
    }
}
