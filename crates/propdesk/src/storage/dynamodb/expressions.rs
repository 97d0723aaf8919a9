//! Pure rendering of key conditions, guards and update clauses into DynamoDB
//! expression strings.
//!
//! Every attribute name goes through a `#` placeholder, so reserved words such
//! as `status` or `name` never reach the expression text. Each expression kind
//! uses its own placeholder prefix so they can be merged into one request.

use std::collections::BTreeMap;

use propdesk_core::storage::{
    AttributeValue, Condition, FilterExpression, KeyCondition, QueryRequest, UpdateAction, PK,
};

/// Expression text plus its placeholder bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expression {
    pub text: String,
    pub names: BTreeMap<String, String>,
    pub values: BTreeMap<String, AttributeValue>,
}

impl Expression {
    /// Adds another expression's bindings to this one, keeping this text.
    pub fn merge_bindings(
        &mut self,
        names: BTreeMap<String, String>,
        values: BTreeMap<String, AttributeValue>,
    ) {
        self.names.extend(names);
        self.values.extend(values);
    }
}

impl From<FilterExpression> for Expression {
    fn from(filter: FilterExpression) -> Self {
        Self {
            text: filter.expression,
            names: filter.names,
            values: filter.values,
        }
    }
}

struct Placeholders<'a> {
    prefix: &'a str,
    next: usize,
    names: BTreeMap<String, String>,
    values: BTreeMap<String, AttributeValue>,
}

impl<'a> Placeholders<'a> {
    fn new(prefix: &'a str) -> Self {
        Self {
            prefix,
            next: 0,
            names: BTreeMap::new(),
            values: BTreeMap::new(),
        }
    }

    fn name(&mut self, attribute: &str) -> String {
        if let Some((placeholder, _)) = self.names.iter().find(|(_, a)| a.as_str() == attribute) {
            return placeholder.clone();
        }
        let placeholder = format!("#{}{}", self.prefix, self.next);
        self.next += 1;
        self.names.insert(placeholder.clone(), attribute.to_string());
        placeholder
    }

    fn value(&mut self, value: AttributeValue) -> String {
        let placeholder = format!(":{}{}", self.prefix, self.next);
        self.next += 1;
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    fn finish(self, text: String) -> Expression {
        Expression {
            text,
            names: self.names,
            values: self.values,
        }
    }
}

/// Renders the partition and optional sort-key condition of a query.
pub fn key_condition(request: &QueryRequest) -> Expression {
    let mut p = Placeholders::new("k");
    let pk = p.name(request.index.partition_attribute());
    let pk_value = p.value(AttributeValue::string(&request.partition));
    let mut text = format!("{pk} = {pk_value}");

    if let Some(sort) = &request.sort {
        let sk = p.name(request.index.sort_attribute());
        let clause = match sort {
            KeyCondition::Equals(value) => {
                format!("{sk} = {}", p.value(AttributeValue::string(value)))
            }
            KeyCondition::BeginsWith(prefix) => {
                format!("begins_with({sk}, {})", p.value(AttributeValue::string(prefix)))
            }
            KeyCondition::Between(low, high) => {
                let low = p.value(AttributeValue::string(low));
                let high = p.value(AttributeValue::string(high));
                format!("{sk} BETWEEN {low} AND {high}")
            }
        };
        text.push_str(" AND ");
        text.push_str(&clause);
    }

    p.finish(text)
}

/// Renders a write guard.
pub fn condition_expression(condition: &Condition) -> Expression {
    let mut p = Placeholders::new("c");
    let text = render_condition(condition, &mut p);
    p.finish(text)
}

fn render_condition(condition: &Condition, p: &mut Placeholders<'_>) -> String {
    match condition {
        Condition::Exists => format!("attribute_exists({})", p.name(PK)),
        Condition::NotExists => format!("attribute_not_exists({})", p.name(PK)),
        Condition::AttributeNotEquals { attribute, value } => {
            let name = p.name(attribute);
            let value = p.value(value.clone());
            format!("(attribute_not_exists({name}) OR {name} <> {value})")
        }
        Condition::All(conditions) => conditions
            .iter()
            .map(|c| render_condition(c, p))
            .collect::<Vec<_>>()
            .join(" AND "),
    }
}

/// Renders update clauses as `SET ... REMOVE ... ADD ... DELETE ...`.
pub fn update_expression(actions: &[UpdateAction]) -> Expression {
    let mut p = Placeholders::new("u");
    let mut set = Vec::new();
    let mut remove = Vec::new();
    let mut add = Vec::new();
    let mut delete = Vec::new();

    for action in actions {
        match action {
            UpdateAction::Set { attribute, value } => {
                let name = p.name(attribute);
                set.push(format!("{name} = {}", p.value(value.clone())));
            }
            UpdateAction::SetIfAbsent { attribute, value } => {
                let name = p.name(attribute);
                set.push(format!("{name} = if_not_exists({name}, {})", p.value(value.clone())));
            }
            UpdateAction::Remove { attribute } => remove.push(p.name(attribute)),
            UpdateAction::AddToSet { attribute, values } => {
                let name = p.name(attribute);
                add.push(format!("{name} {}", p.value(AttributeValue::Ss(values.clone()))));
            }
            UpdateAction::RemoveFromSet { attribute, values } => {
                let name = p.name(attribute);
                delete.push(format!("{name} {}", p.value(AttributeValue::Ss(values.clone()))));
            }
        }
    }

    let text = [("SET", set), ("REMOVE", remove), ("ADD", add), ("DELETE", delete)]
        .into_iter()
        .filter(|(_, clauses)| !clauses.is_empty())
        .map(|(keyword, clauses)| format!("{keyword} {}", clauses.join(", ")))
        .collect::<Vec<_>>()
        .join(" ");

    p.finish(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use propdesk_core::storage::Index;

    #[test]
    fn test_key_condition_with_prefix() {
        let request = QueryRequest::new(Index::Gsi1, "PM#pm@x.com")
            .sort_key(KeyCondition::BeginsWith("WO#".to_string()));
        let expr = key_condition(&request);

        assert_eq!(expr.text, "#k0 = :k1 AND begins_with(#k2, :k3)");
        assert_eq!(expr.names.get("#k0").unwrap(), "GSI1PK");
        assert_eq!(expr.names.get("#k2").unwrap(), "GSI1SK");
        assert_eq!(expr.values.get(":k3").unwrap().as_s(), Some("WO#"));
    }

    #[test]
    fn test_condition_not_equals_tolerates_missing_attribute() {
        let condition = Condition::All(vec![
            Condition::Exists,
            Condition::not_equals("status", AttributeValue::string("DELETED")),
        ]);
        let expr = condition_expression(&condition);
        assert_eq!(
            expr.text,
            "attribute_exists(#c0) AND (attribute_not_exists(#c1) OR #c1 <> :c2)"
        );
        assert_eq!(expr.names.get("#c1").unwrap(), "status");
    }

    #[test]
    fn test_update_expression_groups_clauses() {
        let actions = vec![
            UpdateAction::set("name", AttributeValue::string("Jane")),
            UpdateAction::set_if_absent("createdAt", AttributeValue::string("t")),
            UpdateAction::remove("GSI1PK"),
            UpdateAction::add_to_set("roles", ["TENANT"]),
            UpdateAction::remove_from_set("assignedTo", ["a@x.com"]),
        ];
        let expr = update_expression(&actions);
        assert_eq!(
            expr.text,
            "SET #u0 = :u1, #u2 = if_not_exists(#u2, :u3) REMOVE #u4 ADD #u5 :u6 DELETE #u7 :u8"
        );
        assert_eq!(expr.names.len(), 5);
        assert_eq!(expr.values.len(), 4);
    }
}
