//! Field definitions and typed field values
//!
//! The known field set is closed: every field the counselor can collect,
//! and every field an AI update instruction may target, is a [`FieldName`].
//! Each field maps to exactly one [`FieldKind`], which selects the parser.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::text::normalize_label;

/// Parser family responsible for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Money amount in whole currency units
    Currency,
    /// Age in years, 18..=100
    Age,
    /// Closed marital-status enum
    MaritalStatus,
    /// Number of dependents, 0..=20
    Dependents,
    /// Proper name, title-cased
    Name,
    /// Free text (trimmed)
    Text,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Currency => "currency",
            FieldKind::Age => "age",
            FieldKind::MaritalStatus => "marital_status",
            FieldKind::Dependents => "dependents",
            FieldKind::Name => "name",
            FieldKind::Text => "text",
        }
    }
}

/// Known profile and budget fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    FullName,
    Age,
    MaritalStatus,
    Dependents,
    Occupation,
    MonthlyIncome,
    HousingExpense,
    FoodExpense,
    TransportExpense,
    DebtPayments,
    SavingsGoal,
}

impl FieldName {
    /// Every known field, in canonical order
    pub const ALL: [FieldName; 11] = [
        FieldName::FullName,
        FieldName::Age,
        FieldName::MaritalStatus,
        FieldName::Dependents,
        FieldName::Occupation,
        FieldName::MonthlyIncome,
        FieldName::HousingExpense,
        FieldName::FoodExpense,
        FieldName::TransportExpense,
        FieldName::DebtPayments,
        FieldName::SavingsGoal,
    ];

    /// Stable identifier used in configuration, prompts and persistence
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::FullName => "full_name",
            FieldName::Age => "age",
            FieldName::MaritalStatus => "marital_status",
            FieldName::Dependents => "dependents",
            FieldName::Occupation => "occupation",
            FieldName::MonthlyIncome => "monthly_income",
            FieldName::HousingExpense => "housing_expense",
            FieldName::FoodExpense => "food_expense",
            FieldName::TransportExpense => "transport_expense",
            FieldName::DebtPayments => "debt_payments",
            FieldName::SavingsGoal => "savings_goal",
        }
    }

    /// Spanish label shown to the user and accepted from the AI
    pub fn display_label(&self) -> &'static str {
        match self {
            FieldName::FullName => "nombre completo",
            FieldName::Age => "edad",
            FieldName::MaritalStatus => "estado civil",
            FieldName::Dependents => "personas a cargo",
            FieldName::Occupation => "ocupación",
            FieldName::MonthlyIncome => "ingreso mensual",
            FieldName::HousingExpense => "gasto en vivienda",
            FieldName::FoodExpense => "gasto en alimentación",
            FieldName::TransportExpense => "gasto en transporte",
            FieldName::DebtPayments => "pago de deudas",
            FieldName::SavingsGoal => "meta de ahorro",
        }
    }

    /// Parser family for this field
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldName::FullName => FieldKind::Name,
            FieldName::Age => FieldKind::Age,
            FieldName::MaritalStatus => FieldKind::MaritalStatus,
            FieldName::Dependents => FieldKind::Dependents,
            FieldName::Occupation => FieldKind::Text,
            FieldName::MonthlyIncome
            | FieldName::HousingExpense
            | FieldName::FoodExpense
            | FieldName::TransportExpense
            | FieldName::DebtPayments
            | FieldName::SavingsGoal => FieldKind::Currency,
        }
    }

    /// Resolve a free-form label against the known field set
    ///
    /// Accepts the identifier or the Spanish display label, ignoring case,
    /// accents and separator style. Unknown labels return `None`.
    pub fn from_label(label: &str) -> Option<FieldName> {
        let wanted = normalize_label(label);
        if wanted.is_empty() {
            return None;
        }
        Self::ALL.iter().copied().find(|field| {
            field.as_str() == wanted || normalize_label(field.display_label()) == wanted
        })
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FieldName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldName::from_label(s).ok_or_else(|| format!("unknown field: {}", s))
    }
}

/// Marital status categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaritalStatus {
    Single,
    Married,
    DomesticPartnership,
    Divorced,
    Separated,
    Widowed,
}

impl MaritalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaritalStatus::Single => "single",
            MaritalStatus::Married => "married",
            MaritalStatus::DomesticPartnership => "domestic_partnership",
            MaritalStatus::Divorced => "divorced",
            MaritalStatus::Separated => "separated",
            MaritalStatus::Widowed => "widowed",
        }
    }
}

impl fmt::Display for MaritalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed value of a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Whole currency units
    Currency(i64),
    Age(u8),
    MaritalStatus(MaritalStatus),
    Dependents(u8),
    Name(String),
    Text(String),
}

impl FieldValue {
    /// Parser family that produces this value
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Currency(_) => FieldKind::Currency,
            FieldValue::Age(_) => FieldKind::Age,
            FieldValue::MaritalStatus(_) => FieldKind::MaritalStatus,
            FieldValue::Dependents(_) => FieldKind::Dependents,
            FieldValue::Name(_) => FieldKind::Name,
            FieldValue::Text(_) => FieldKind::Text,
        }
    }

    /// Plain JSON form handed to persistence
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Currency(amount) => serde_json::json!(amount),
            FieldValue::Age(n) | FieldValue::Dependents(n) => serde_json::json!(n),
            FieldValue::MaritalStatus(status) => serde_json::json!(status.as_str()),
            FieldValue::Name(s) | FieldValue::Text(s) => serde_json::json!(s),
        }
    }

    pub fn as_currency(&self) -> Option<i64> {
        match self {
            FieldValue::Currency(amount) => Some(*amount),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Currency(amount) => write!(f, "{}", amount),
            FieldValue::Age(n) | FieldValue::Dependents(n) => write!(f, "{}", n),
            FieldValue::MaritalStatus(status) => write!(f, "{}", status),
            FieldValue::Name(s) | FieldValue::Text(s) => f.write_str(s),
        }
    }
}

/// Result of running a field parser on one utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedField {
    pub field: FieldName,
    pub value: FieldValue,
    /// Parser confidence (0.0 - 1.0)
    pub confidence: f32,
}

impl ParsedField {
    pub fn new(field: FieldName, value: FieldValue, confidence: f32) -> Self {
        Self {
            field,
            value,
            confidence,
        }
    }
}

/// Field-name to value pairs handed to the persistence collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialRecord {
    pub fields: BTreeMap<FieldName, FieldValue>,
}

impl PartialRecord {
    pub fn single(field: FieldName, value: FieldValue) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field, value);
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// JSON object keyed by field identifier
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}

/// Latest known value of every collected field
///
/// Owned by the conversation loop. Merging returns the partial record
/// that should be upserted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    values: BTreeMap<FieldName, FieldValue>,
}

impl ProfileRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a parsed field, returning the previous value if any
    pub fn merge(&mut self, parsed: &ParsedField) -> (PartialRecord, Option<FieldValue>) {
        let previous = self.values.insert(parsed.field, parsed.value.clone());
        (PartialRecord::single(parsed.field, parsed.value.clone()), previous)
    }

    pub fn get(&self, field: FieldName) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldName, &FieldValue)> {
        self.values.iter()
    }

    /// Sum of the budget expense fields collected so far
    pub fn total_expenses(&self) -> i64 {
        [
            FieldName::HousingExpense,
            FieldName::FoodExpense,
            FieldName::TransportExpense,
            FieldName::DebtPayments,
        ]
        .iter()
        .filter_map(|f| self.get(*f).and_then(FieldValue::as_currency))
        .sum()
    }

    /// Render as `label: value` lines for prompts
    pub fn to_context_string(&self) -> String {
        self.values
            .iter()
            .map(|(name, value)| format!("- {}: {}", name.display_label(), value))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
