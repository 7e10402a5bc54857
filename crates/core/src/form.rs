use std::collections::BTreeMap;

use thiserror::Error;

use crate::data_access::{DataAccessError, DataBackend, Record, SqlValue};

pub const NUMERIC_MAX: f64 = 1_000_000_000_000.0;
const NUMERIC_DECIMALS: usize = 2;

#[derive(Debug)]
pub struct ForeignKeyLookup {
    pub name: &'static str,
    pub query: &'static str,
    pub id_column: &'static str,
    pub label: fn(&Record) -> String,
}

impl ForeignKeyLookup {
    pub async fn load<B: DataBackend + ?Sized>(
        &self,
        backend: &B,
    ) -> Result<Vec<Choice>, DataAccessError> {
        let result = backend.query(self.query, &[]).await?;
        Ok(result
            .records
            .iter()
            .filter_map(|record| {
                let id = record.get(self.id_column)?.as_i64()?;
                Some(Choice {
                    value: SqlValue::Int(id),
                    label: (self.label)(record),
                })
            })
            .collect())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Text,
    Password,
    Numeric,
    Enumerated(&'static [&'static str]),
    ForeignKey(&'static ForeignKeyLookup),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    #[must_use]
    pub const fn text(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Text,
        }
    }

    #[must_use]
    pub const fn password(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Password,
        }
    }

    #[must_use]
    pub const fn numeric(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Numeric,
        }
    }

    #[must_use]
    pub const fn enumerated(
        name: &'static str,
        label: &'static str,
        choices: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Enumerated(choices),
        }
    }

    #[must_use]
    pub const fn foreign_key(
        name: &'static str,
        label: &'static str,
        lookup: &'static ForeignKeyLookup,
    ) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::ForeignKey(lookup),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub value: SqlValue,
    pub label: String,
}

#[derive(Debug, Clone, Default)]
pub struct ForeignKeyOptions {
    by_lookup: BTreeMap<&'static str, Vec<Choice>>,
}

impl ForeignKeyOptions {
    pub async fn load<B: DataBackend + ?Sized>(
        fields: &[FieldDescriptor],
        backend: &B,
    ) -> Result<Self, DataAccessError> {
        let mut options = Self::default();
        for field in fields {
            let FieldKind::ForeignKey(lookup) = field.kind else {
                continue;
            };
            if options.by_lookup.contains_key(lookup.name) {
                continue;
            }
            let choices = lookup.load(backend).await?;
            options.by_lookup.insert(lookup.name, choices);
        }
        Ok(options)
    }

    pub fn insert(&mut self, lookup: &'static str, choices: Vec<Choice>) {
        self.by_lookup.insert(lookup, choices);
    }

    #[must_use]
    pub fn choices(&self, lookup: &ForeignKeyLookup) -> &[Choice] {
        self.by_lookup
            .get(lookup.name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldInput {
    Text { value: String, masked: bool },
    Numeric { buffer: String },
    Choice { choices: Vec<Choice>, selected: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: &'static str,
    pub label: &'static str,
    pub input: FieldInput,
}

impl FormField {
    #[must_use]
    pub fn display(&self) -> String {
        match &self.input {
            FieldInput::Text { value, masked } => {
                if *masked {
                    "*".repeat(value.chars().count())
                } else {
                    value.clone()
                }
            }
            FieldInput::Numeric { buffer } => {
                if buffer.is_empty() {
                    format!("{:.*}", NUMERIC_DECIMALS, 0.0)
                } else {
                    buffer.clone()
                }
            }
            FieldInput::Choice { choices, selected } => choices
                .get(*selected)
                .map_or_else(|| "(no choices)".to_string(), |choice| choice.label.clone()),
        }
    }

    #[must_use]
    pub fn is_choice(&self) -> bool {
        matches!(self.input, FieldInput::Choice { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("`{field}` has no choices to pick from")]
    NoChoices { field: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordForm {
    title: String,
    fields: Vec<FormField>,
    focused: usize,
}

impl RecordForm {
    #[must_use]
    pub fn open(
        title: impl Into<String>,
        descriptors: &[FieldDescriptor],
        options: &ForeignKeyOptions,
        initial: Option<&Record>,
    ) -> Self {
        let fields = descriptors
            .iter()
            .map(|descriptor| {
                let initial_value = initial.and_then(|record| record.get(descriptor.name));
                FormField {
                    name: descriptor.name,
                    label: descriptor.label,
                    input: initial_input(descriptor, options, initial_value),
                }
            })
            .collect();

        Self {
            title: title.into(),
            fields,
            focused: 0,
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    #[must_use]
    pub fn focused(&self) -> usize {
        self.focused
    }

    pub fn focus_next(&mut self) {
        if !self.fields.is_empty() {
            self.focused = (self.focused + 1) % self.fields.len();
        }
    }

    pub fn focus_previous(&mut self) {
        if !self.fields.is_empty() {
            self.focused = (self.focused + self.fields.len() - 1) % self.fields.len();
        }
    }

    pub fn input_char(&mut self, ch: char) -> bool {
        let Some(field) = self.fields.get_mut(self.focused) else {
            return false;
        };

        match &mut field.input {
            FieldInput::Text { value, .. } => {
                value.push(ch);
                true
            }
            FieldInput::Numeric { buffer } => {
                let mut candidate = buffer.clone();
                candidate.push(ch);
                if numeric_buffer_is_valid(&candidate) {
                    *buffer = candidate;
                    true
                } else {
                    false
                }
            }
            FieldInput::Choice { .. } => false,
        }
    }

    pub fn backspace(&mut self) {
        if let Some(field) = self.fields.get_mut(self.focused) {
            match &mut field.input {
                FieldInput::Text { value, .. } => {
                    value.pop();
                }
                FieldInput::Numeric { buffer } => {
                    buffer.pop();
                }
                FieldInput::Choice { .. } => {}
            }
        }
    }

    pub fn select_next(&mut self) {
        self.cycle_choice(true);
    }

    pub fn select_previous(&mut self) {
        self.cycle_choice(false);
    }

    fn cycle_choice(&mut self, forward: bool) {
        let Some(FormField {
            input: FieldInput::Choice { choices, selected },
            ..
        }) = self.fields.get_mut(self.focused)
        else {
            return;
        };
        if choices.is_empty() {
            return;
        }
        *selected = if forward {
            (*selected + 1) % choices.len()
        } else {
            (*selected + choices.len() - 1) % choices.len()
        };
    }

    pub fn submit(&self) -> Result<Record, FormError> {
        let mut record = Record::new();
        for field in &self.fields {
            let value = match &field.input {
                FieldInput::Text { value, .. } => SqlValue::text(value.trim()),
                FieldInput::Numeric { buffer } => SqlValue::Double(parse_numeric(buffer)),
                FieldInput::Choice { choices, selected } => choices
                    .get(*selected)
                    .map(|choice| choice.value.clone())
                    .ok_or_else(|| FormError::NoChoices {
                        field: field.label.to_string(),
                    })?,
            };
            record.insert(field.name, value);
        }
        Ok(record)
    }
}

fn initial_input(
    descriptor: &FieldDescriptor,
    options: &ForeignKeyOptions,
    initial: Option<&SqlValue>,
) -> FieldInput {
    match descriptor.kind {
        FieldKind::Text | FieldKind::Password => FieldInput::Text {
            value: initial.map(ToString::to_string).unwrap_or_default(),
            masked: matches!(descriptor.kind, FieldKind::Password),
        },
        FieldKind::Numeric => FieldInput::Numeric {
            buffer: initial
                .and_then(SqlValue::as_f64)
                .map(|value| format!("{:.*}", NUMERIC_DECIMALS, value.clamp(0.0, NUMERIC_MAX)))
                .unwrap_or_default(),
        },
        FieldKind::Enumerated(values) => {
            let current = initial.map(ToString::to_string);
            let selected = current
                .and_then(|current| values.iter().position(|value| *value == current))
                .unwrap_or(0);
            FieldInput::Choice {
                choices: values
                    .iter()
                    .map(|value| Choice {
                        value: SqlValue::text(*value),
                        label: (*value).to_string(),
                    })
                    .collect(),
                selected,
            }
        }
        FieldKind::ForeignKey(lookup) => {
            let choices = options.choices(lookup).to_vec();
            let selected = initial
                .and_then(SqlValue::as_i64)
                .and_then(|id| {
                    choices
                        .iter()
                        .position(|choice| choice.value.as_i64() == Some(id))
                })
                .unwrap_or(0);
            FieldInput::Choice { choices, selected }
        }
    }
}

fn numeric_buffer_is_valid(buffer: &str) -> bool {
    let mut parts = buffer.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();

    if !whole.chars().all(|ch| ch.is_ascii_digit()) {
        return false;
    }
    if let Some(fraction) = fraction {
        if fraction.len() > NUMERIC_DECIMALS || !fraction.chars().all(|ch| ch.is_ascii_digit()) {
            return false;
        }
    }

    parse_numeric(buffer) <= NUMERIC_MAX
}

fn parse_numeric(buffer: &str) -> f64 {
    let trimmed = buffer.trim_end_matches('.');
    if trimmed.is_empty() {
        return 0.0;
    }
    let value = trimmed.parse::<f64>().unwrap_or(0.0);
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::{
        Choice, FieldDescriptor, FieldInput, ForeignKeyLookup, ForeignKeyOptions, FormError,
        RecordForm,
    };
    use crate::data_access::{DataAccessError, DataBackend, Record, ResultSet, SqlValue};

    fn user_label(record: &Record) -> String {
        format!(
            "{} - {}",
            record.get("user_id").map(ToString::to_string).unwrap_or_default(),
            record.get("nama").map(ToString::to_string).unwrap_or_default()
        )
    }

    static USERS: ForeignKeyLookup = ForeignKeyLookup {
        name: "users",
        query: "SELECT user_id, nama FROM users ORDER BY user_id",
        id_column: "user_id",
        label: user_label,
    };

    const METHODS: &[&str] = &["cash", "e-wallet", "kartu"];

    fn user_choices() -> Vec<Choice> {
        vec![
            Choice {
                value: SqlValue::Int(1),
                label: "1 - Andi".to_string(),
            },
            Choice {
                value: SqlValue::Int(2),
                label: "2 - Budi".to_string(),
            },
        ]
    }

    fn options() -> ForeignKeyOptions {
        let mut options = ForeignKeyOptions::default();
        options.insert("users", user_choices());
        options
    }

    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::foreign_key("user_id", "User", &USERS),
            FieldDescriptor::text("plat_nomor", "Plat Nomor"),
            FieldDescriptor::password("password", "Password"),
            FieldDescriptor::numeric("jumlah", "Jumlah"),
            FieldDescriptor::enumerated("metode", "Metode", METHODS),
        ]
    }

    #[test]
    fn blank_form_defaults_to_first_choices_and_zero() {
        let form = RecordForm::open("Add", &fields(), &options(), None);
        let record = form.submit().expect("blank form submits");

        assert_eq!(record.get("user_id"), Some(&SqlValue::Int(1)));
        assert_eq!(record.get("plat_nomor"), Some(&SqlValue::text("")));
        assert_eq!(record.get("jumlah"), Some(&SqlValue::Double(0.0)));
        assert_eq!(record.get("metode"), Some(&SqlValue::text("cash")));
        assert_eq!(form.fields()[3].display(), "0.00");
    }

    #[test]
    fn initial_values_preselect_matching_choices() {
        let initial = Record::new()
            .with("user_id", SqlValue::text("2"))
            .with("plat_nomor", "B 1234 XY")
            .with("password", "rahasia")
            .with("jumlah", SqlValue::text("15000.5"))
            .with("metode", "kartu");

        let form = RecordForm::open("Edit", &fields(), &options(), Some(&initial));
        let record = form.submit().expect("edit form submits");

        assert_eq!(record.get("user_id"), Some(&SqlValue::Int(2)));
        assert_eq!(record.get("metode"), Some(&SqlValue::text("kartu")));
        assert_eq!(record.get("jumlah"), Some(&SqlValue::Double(15000.5)));
        assert_eq!(form.fields()[0].display(), "2 - Budi");
        assert_eq!(form.fields()[2].display(), "*******");
        assert_eq!(form.fields()[3].display(), "15000.50");
    }

    #[test]
    fn unknown_enumerated_initial_falls_back_to_first_choice() {
        let initial = Record::new().with("metode", "transfer");
        let form = RecordForm::open("Edit", &fields(), &options(), Some(&initial));

        assert!(matches!(
            &form.fields()[4].input,
            FieldInput::Choice { selected: 0, .. }
        ));
    }

    #[test]
    fn numeric_input_rejects_invalid_keystrokes() {
        let mut form = RecordForm::open("Add", &fields(), &options(), None);
        form.focus_previous();
        form.focus_previous();
        assert_eq!(form.fields()[form.focused()].name, "jumlah");

        for ch in "12.345".chars() {
            form.input_char(ch);
        }
        assert!(!form.input_char('x'));
        assert!(!form.input_char('.'));
        assert_eq!(form.fields()[3].display(), "12.34");

        form.backspace();
        form.backspace();
        form.backspace();
        form.backspace();
        form.backspace();
        for ch in "1000000000000".chars() {
            assert!(form.input_char(ch));
        }
        assert!(!form.input_char('0'));
        assert!(!form.input_char('-'));
    }

    #[test]
    fn text_input_is_trimmed_and_choices_cycle() {
        let mut form = RecordForm::open("Add", &fields(), &options(), None);
        form.select_next();
        form.focus_next();
        for ch in "  B 1 XY ".chars() {
            form.input_char(ch);
        }
        assert_eq!(form.fields()[1].display(), "  B 1 XY ");

        form.focus_next();
        form.focus_next();
        form.focus_next();
        form.select_previous();

        let record = form.submit().expect("form submits");
        assert_eq!(record.get("user_id"), Some(&SqlValue::Int(2)));
        assert_eq!(record.get("plat_nomor"), Some(&SqlValue::text("B 1 XY")));
        assert_eq!(record.get("metode"), Some(&SqlValue::text("kartu")));
    }

    #[test]
    fn foreign_key_without_choices_cannot_submit() {
        let form = RecordForm::open("Add", &fields(), &ForeignKeyOptions::default(), None);

        assert_eq!(form.fields()[0].display(), "(no choices)");
        assert_eq!(
            form.submit(),
            Err(FormError::NoChoices {
                field: "User".to_string()
            })
        );
    }

    #[derive(Debug)]
    struct UsersBackend;

    #[async_trait::async_trait]
    impl DataBackend for UsersBackend {
        async fn query(
            &self,
            _sql: &str,
            _params: &[SqlValue],
        ) -> Result<ResultSet, DataAccessError> {
            Ok(ResultSet::new(
                vec!["user_id".to_string(), "nama".to_string()],
                vec![
                    Record::new().with("user_id", SqlValue::text("7")).with("nama", "Citra"),
                    Record::new().with("user_id", SqlValue::Null).with("nama", "orphan"),
                ],
            ))
        }

        async fn execute(&self, _sql: &str, _params: &[SqlValue]) -> Result<u64, DataAccessError> {
            Ok(0)
        }

        async fn ping(&self) -> Result<(), DataAccessError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn options_load_ids_not_labels() {
        let options = ForeignKeyOptions::load(&fields(), &UsersBackend)
            .await
            .expect("options load");

        assert_eq!(
            options.choices(&USERS),
            [Choice {
                value: SqlValue::Int(7),
                label: "7 - Citra".to_string(),
            }]
        );
    }
}
