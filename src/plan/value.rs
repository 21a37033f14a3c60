//! Configuration values threaded between resources. Derived identifiers (ARNs, URLs, keys)
//! only exist once the platform creates the resource, so they are carried as references.

use serde::Serialize;
use std::fmt;

/// Template-level identifier of a resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deployment-wide parameters known only to the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Pseudo {
    Region,
    AccountId,
    Partition,
}

impl Pseudo {
    pub fn name(&self) -> &'static str {
        match self {
            Pseudo::Region => "AWS::Region",
            Pseudo::AccountId => "AWS::AccountId",
            Pseudo::Partition => "AWS::Partition",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Literal(String),
    /// The resource's primary identifier.
    Ref(ResourceId),
    GetAtt {
        resource: ResourceId,
        attribute: String,
    },
    Pseudo(Pseudo),
    /// Concatenation without separator.
    Join(Vec<Value>),
}

impl Value {
    pub fn literal(s: impl Into<String>) -> Self {
        Value::Literal(s.into())
    }

    pub fn reference(id: &ResourceId) -> Self {
        Value::Ref(id.clone())
    }

    pub fn attribute(id: &ResourceId, attribute: &str) -> Self {
        Value::GetAtt {
            resource: id.clone(),
            attribute: attribute.to_string(),
        }
    }

    /// Concatenate parts, merging adjacent literals.
    pub fn join(parts: Vec<Value>) -> Self {
        let mut merged: Vec<Value> = Vec::with_capacity(parts.len());
        for part in parts {
            if let (Value::Literal(next), Some(Value::Literal(prev))) = (&part, merged.last_mut()) {
                prev.push_str(next);
                continue;
            }
            merged.push(part);
        }
        match merged.len() {
            0 => Value::literal(""),
            1 => merged.remove(0),
            _ => Value::Join(merged),
        }
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Value::Literal(s) => Some(s),
            _ => None,
        }
    }

    /// Every resource this value reads from.
    pub fn references(&self) -> Vec<&ResourceId> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a ResourceId>) {
        match self {
            Value::Ref(id) | Value::GetAtt { resource: id, .. } => out.push(id),
            Value::Join(parts) => parts.iter().for_each(|p| p.collect_references(out)),
            Value::Literal(_) | Value::Pseudo(_) => {}
        }
    }
}

/// Account/region scope of a plan: literals when the target is known, pseudo parameters otherwise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scope {
    pub region: Value,
    pub account: Value,
}

impl Scope {
    pub fn new(account: Option<&str>, region: Option<&str>) -> Self {
        Self {
            region: region.map_or(Value::Pseudo(Pseudo::Region), Value::literal),
            account: account.map_or(Value::Pseudo(Pseudo::AccountId), Value::literal),
        }
    }

    /// `arn:<partition>:<service>:<region>:<account>:<resource>`
    pub fn arn(&self, service: &str, resource: Value) -> Value {
        Value::join(vec![
            Value::literal("arn:"),
            Value::Pseudo(Pseudo::Partition),
            Value::literal(format!(":{}:", service)),
            self.region.clone(),
            Value::literal(":"),
            self.account.clone(),
            Value::literal(":"),
            resource,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_merges_adjacent_literals() {
        let id = ResourceId::new("Cluster");
        let v = Value::join(vec![
            Value::literal("a"),
            Value::literal("b"),
            Value::reference(&id),
            Value::literal("c"),
        ]);
        assert_eq!(
            v,
            Value::Join(vec![Value::literal("ab"), Value::Ref(id), Value::literal("c")])
        );
        assert_eq!(Value::join(vec![Value::literal("x")]), Value::literal("x"));
    }

    #[test]
    fn references_walk_nested_joins() {
        let a = ResourceId::new("A");
        let b = ResourceId::new("B");
        let v = Value::join(vec![
            Value::reference(&a),
            Value::literal("/"),
            Value::join(vec![Value::attribute(&b, "Arn"), Value::Pseudo(Pseudo::Region)]),
        ]);
        assert_eq!(v.references(), vec![&a, &b]);
        assert!(Value::literal("x").references().is_empty());
    }

    #[test]
    fn scope_with_known_region_uses_literal() {
        let scope = Scope::new(Some("123456789012"), Some("eu-west-1"));
        assert_eq!(scope.region.as_literal(), Some("eu-west-1"));
        let agnostic = Scope::new(None, None);
        assert_eq!(agnostic.region, Value::Pseudo(Pseudo::Region));
        assert_eq!(agnostic.account, Value::Pseudo(Pseudo::AccountId));
    }

    #[test]
    fn arn_keeps_partition_pseudo() {
        let scope = Scope::new(Some("123456789012"), Some("eu-west-1"));
        let arn = scope.arn("rds", Value::literal("cluster:db"));
        assert_eq!(
            arn,
            Value::Join(vec![
                Value::literal("arn:"),
                Value::Pseudo(Pseudo::Partition),
                Value::literal(":rds:eu-west-1:123456789012:cluster:db"),
            ])
        );
    }
}
