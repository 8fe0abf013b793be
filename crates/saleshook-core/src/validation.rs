//! Closed-schema validation of sale-status payloads.
//!
//! Turns an arbitrary JSON body into a [`ValidatedPayload`] or an ordered
//! list of [`FieldError`]s. The schema is closed at every level: keys that
//! are not declared are reported as `extra_forbidden` rather than dropped.
//!
//! Error order is fixed. Within an object, declared fields are checked in
//! declaration order (nested objects are expanded in place), then
//! undeclared keys are reported in map order. The same input therefore
//! always yields the same error list.
//!
//! Every string is trimmed before any other check, so `"  a "` fails a
//! two-character minimum.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::payload::{ClientDescriptor, SpouseDescriptor, ValidatedPayload, VentureDescriptor};

const PAYLOAD_FIELDS: &[&str] = &[
    "id_venda",
    "status",
    "data_criacao",
    "data_atualizacao",
    "dados_empreendimento",
    "dados_cliente",
];
const VENTURE_FIELDS: &[&str] = &["nome", "endereco", "unidade", "bloco", "vagas"];
const CLIENT_FIELDS: &[&str] =
    &["nome", "sexo", "data_de_nascimento", "email", "telefone", "estado_civil", "conjuge"];
const SPOUSE_FIELDS: &[&str] = &["nome", "sexo", "data_de_nascimento", "email", "telefone"];

const NAME_MIN_LENGTH: usize = 2;

/// Machine-readable category of a field error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Required field absent.
    Missing,
    /// Field not declared by the schema.
    ExtraForbidden,
    /// Body is not parseable JSON.
    JsonInvalid,
    /// Expected an object.
    ModelType,
    /// Expected a string.
    StringType,
    /// String shorter than the minimum after trimming.
    StringTooShort,
    /// Expected an integer.
    IntType,
    /// String that does not parse as an integer.
    IntParsing,
    /// Number with a fractional part where an integer is expected.
    IntFromFloat,
    /// Not a `YYYY-MM-DD` date.
    DateParsing,
    /// Not an ISO-8601 datetime.
    DatetimeParsing,
    /// Expected a list.
    ListType,
    /// Semantic check failed (email format).
    ValueError,
}

impl ErrorKind {
    /// Returns the wire tag for this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::ExtraForbidden => "extra_forbidden",
            Self::JsonInvalid => "json_invalid",
            Self::ModelType => "model_type",
            Self::StringType => "string_type",
            Self::StringTooShort => "string_too_short",
            Self::IntType => "int_type",
            Self::IntParsing => "int_parsing",
            Self::IntFromFloat => "int_from_float",
            Self::DateParsing => "date_parsing",
            Self::DatetimeParsing => "datetime_parsing",
            Self::ListType => "list_type",
            Self::ValueError => "value_error",
        }
    }
}

/// One segment of a field location: an object key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Object key.
    Key(String),
    /// List index.
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// A single schema violation.
///
/// `loc` is relative to the body root; an empty `loc` refers to the body
/// itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Error category.
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    /// Location of the offending value.
    pub loc: Vec<PathSegment>,
    /// Human-readable description.
    pub msg: String,
}

impl FieldError {
    /// Returns true if `loc` ends with the given keys.
    pub fn loc_ends_with(&self, keys: &[&str]) -> bool {
        keys.len() <= self.loc.len()
            && self.loc[self.loc.len() - keys.len()..]
                .iter()
                .zip(keys)
                .all(|(segment, key)| matches!(segment, PathSegment::Key(k) if k == key))
    }
}

/// Validates raw request bytes.
///
/// An empty body is reported as `missing` and bytes that are not JSON as
/// `json_invalid`, both located at the body root.
///
/// # Errors
///
/// Returns the ordered list of field errors if the body is not a valid
/// payload.
pub fn validate_body(body: &[u8]) -> Result<ValidatedPayload, Vec<FieldError>> {
    if body.is_empty() {
        return Err(vec![FieldError {
            kind: ErrorKind::Missing,
            loc: Vec::new(),
            msg: "Field required".to_string(),
        }]);
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(value) => validate(&value),
        Err(e) => Err(vec![FieldError {
            kind: ErrorKind::JsonInvalid,
            loc: Vec::new(),
            msg: format!("JSON decode error at line {} column {}", e.line(), e.column()),
        }]),
    }
}

/// Validates an already-parsed JSON value.
///
/// # Errors
///
/// Returns the ordered list of field errors if the value is not a valid
/// payload.
pub fn validate(value: &Value) -> Result<ValidatedPayload, Vec<FieldError>> {
    let mut checker = Checker::default();
    match payload(&mut checker, value, &[]) {
        Some(valid) if checker.errors.is_empty() => Ok(valid),
        _ => Err(checker.errors),
    }
}

fn payload(c: &mut Checker, value: &Value, loc: &[PathSegment]) -> Option<ValidatedPayload> {
    let obj = c.object(value, loc)?;

    let sale_id = c.required(obj, "id_venda", loc, Checker::integer);
    let status = c.required(obj, "status", loc, |c, v, l| c.string(v, l, 0));
    let created_at = c.required(obj, "data_criacao", loc, Checker::datetime);
    let updated_at = c.required(obj, "data_atualizacao", loc, Checker::datetime);
    let venture = c.required(obj, "dados_empreendimento", loc, venture);
    let client = c.required(obj, "dados_cliente", loc, client);
    c.forbid_extras(obj, PAYLOAD_FIELDS, loc);

    let (Some(sale_id), Some(status), Some(created_at), Some(updated_at), Some(venture), Some(client)) =
        (sale_id, status, created_at, updated_at, venture, client)
    else {
        return None;
    };

    Some(ValidatedPayload { sale_id, status, created_at, updated_at, venture, client })
}

fn venture(c: &mut Checker, value: &Value, loc: &[PathSegment]) -> Option<VentureDescriptor> {
    let obj = c.object(value, loc)?;

    let name = c.required(obj, "nome", loc, |c, v, l| c.string(v, l, 0));
    let address = c.required(obj, "endereco", loc, |c, v, l| c.string(v, l, 0));
    let unit = c.required(obj, "unidade", loc, |c, v, l| c.string(v, l, 0));
    let block = c.required(obj, "bloco", loc, |c, v, l| c.string(v, l, 0));
    let parking_slots = match obj.get("vagas") {
        None => Some(Vec::new()),
        Some(v) => c.string_list(v, &child(loc, "vagas")),
    };
    c.forbid_extras(obj, VENTURE_FIELDS, loc);

    let (Some(name), Some(address), Some(unit), Some(block), Some(parking_slots)) =
        (name, address, unit, block, parking_slots)
    else {
        return None;
    };

    Some(VentureDescriptor { name, address, unit, block, parking_slots })
}

fn client(c: &mut Checker, value: &Value, loc: &[PathSegment]) -> Option<ClientDescriptor> {
    let obj = c.object(value, loc)?;

    let name = c.required(obj, "nome", loc, |c, v, l| c.string(v, l, NAME_MIN_LENGTH));
    let sex = c.required(obj, "sexo", loc, |c, v, l| c.string(v, l, 0));
    let birth_date = c.required(obj, "data_de_nascimento", loc, Checker::date);
    let email = c.required(obj, "email", loc, Checker::email);
    let phone = c.required(obj, "telefone", loc, |c, v, l| c.string(v, l, 0));
    let marital_status = c.required(obj, "estado_civil", loc, |c, v, l| c.string(v, l, 0));
    let spouse = match obj.get("conjuge") {
        None | Some(Value::Null) => Some(None),
        Some(v) => spouse(c, v, &child(loc, "conjuge")).map(Some),
    };
    c.forbid_extras(obj, CLIENT_FIELDS, loc);

    let (
        Some(name),
        Some(sex),
        Some(birth_date),
        Some(email),
        Some(phone),
        Some(marital_status),
        Some(spouse),
    ) = (name, sex, birth_date, email, phone, marital_status, spouse)
    else {
        return None;
    };

    Some(ClientDescriptor { name, sex, birth_date, email, phone, marital_status, spouse })
}

fn spouse(c: &mut Checker, value: &Value, loc: &[PathSegment]) -> Option<SpouseDescriptor> {
    let obj = c.object(value, loc)?;

    let name = c.required(obj, "nome", loc, |c, v, l| c.string(v, l, NAME_MIN_LENGTH));
    let sex = c.required(obj, "sexo", loc, |c, v, l| c.string(v, l, 0));
    let birth_date = c.required(obj, "data_de_nascimento", loc, Checker::date);
    let email = c.required(obj, "email", loc, Checker::email);
    let phone = c.required(obj, "telefone", loc, |c, v, l| c.string(v, l, 0));
    c.forbid_extras(obj, SPOUSE_FIELDS, loc);

    let (Some(name), Some(sex), Some(birth_date), Some(email), Some(phone)) =
        (name, sex, birth_date, email, phone)
    else {
        return None;
    };

    Some(SpouseDescriptor { name, sex, birth_date, email, phone })
}

fn child(loc: &[PathSegment], segment: impl Into<PathSegment>) -> Vec<PathSegment> {
    let mut path = loc.to_vec();
    path.push(segment.into());
    path
}

/// Accumulates errors while walking the body.
#[derive(Default)]
struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    fn push(&mut self, kind: ErrorKind, loc: &[PathSegment], msg: impl Into<String>) {
        self.errors.push(FieldError { kind, loc: loc.to_vec(), msg: msg.into() });
    }

    fn object<'v>(
        &mut self,
        value: &'v Value,
        loc: &[PathSegment],
    ) -> Option<&'v Map<String, Value>> {
        if let Value::Object(obj) = value {
            Some(obj)
        } else {
            self.push(
                ErrorKind::ModelType,
                loc,
                "Input should be a valid dictionary or object to extract fields from",
            );
            None
        }
    }

    fn required<'v, T>(
        &mut self,
        obj: &'v Map<String, Value>,
        key: &str,
        loc: &[PathSegment],
        check: impl FnOnce(&mut Self, &'v Value, &[PathSegment]) -> Option<T>,
    ) -> Option<T> {
        let loc = child(loc, key);
        match obj.get(key) {
            Some(value) => check(self, value, &loc),
            None => {
                self.push(ErrorKind::Missing, &loc, "Field required");
                None
            },
        }
    }

    fn forbid_extras(&mut self, obj: &Map<String, Value>, declared: &[&str], loc: &[PathSegment]) {
        for key in obj.keys().filter(|key| !declared.contains(&key.as_str())) {
            self.push(ErrorKind::ExtraForbidden, &child(loc, key.as_str()), "Extra inputs are not permitted");
        }
    }

    fn string(&mut self, value: &Value, loc: &[PathSegment], min_length: usize) -> Option<String> {
        let Value::String(raw) = value else {
            self.push(ErrorKind::StringType, loc, "Input should be a valid string");
            return None;
        };

        let trimmed = raw.trim();
        if trimmed.chars().count() < min_length {
            self.push(
                ErrorKind::StringTooShort,
                loc,
                format!("String should have at least {min_length} characters"),
            );
            return None;
        }
        Some(trimmed.to_string())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn integer(&mut self, value: &Value, loc: &[PathSegment]) -> Option<i64> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    return Some(i);
                }
                match n.as_f64() {
                    Some(f) if f.fract() != 0.0 => {
                        self.push(
                            ErrorKind::IntFromFloat,
                            loc,
                            "Input should be a valid integer, got a number with a fractional part",
                        );
                        None
                    },
                    Some(f) if f >= i64::MIN as f64 && f < i64::MAX as f64 => Some(f as i64),
                    _ => {
                        self.push(ErrorKind::IntType, loc, "Input should be a valid integer");
                        None
                    },
                }
            },
            Value::String(s) => s.trim().parse::<i64>().ok().or_else(|| {
                self.push(
                    ErrorKind::IntParsing,
                    loc,
                    "Input should be a valid integer, unable to parse string as an integer",
                );
                None
            }),
            _ => {
                self.push(ErrorKind::IntType, loc, "Input should be a valid integer");
                None
            },
        }
    }

    fn datetime(&mut self, value: &Value, loc: &[PathSegment]) -> Option<DateTime<FixedOffset>> {
        if let Value::Number(n) = value {
            return n.as_f64().and_then(from_unix_timestamp).or_else(|| {
                self.push(ErrorKind::DatetimeParsing, loc, "Input should be a valid datetime");
                None
            });
        }

        let text = self.string(value, loc, 0)?;
        parse_datetime(&text).or_else(|| {
            self.push(ErrorKind::DatetimeParsing, loc, "Input should be a valid datetime");
            None
        })
    }

    fn date(&mut self, value: &Value, loc: &[PathSegment]) -> Option<NaiveDate> {
        let text = self.string(value, loc, 0)?;
        parse_date(&text).or_else(|| {
            self.push(
                ErrorKind::DateParsing,
                loc,
                "Input should be a valid date in the format YYYY-MM-DD",
            );
            None
        })
    }

    fn email(&mut self, value: &Value, loc: &[PathSegment]) -> Option<String> {
        let text = self.string(value, loc, 0)?;
        match normalize_email(&text) {
            Ok(email) => Some(email),
            Err(reason) => {
                self.push(
                    ErrorKind::ValueError,
                    loc,
                    format!("value is not a valid email address: {reason}"),
                );
                None
            },
        }
    }

    fn string_list(&mut self, value: &Value, loc: &[PathSegment]) -> Option<Vec<String>> {
        let Value::Array(items) = value else {
            self.push(ErrorKind::ListType, loc, "Input should be a valid list");
            return None;
        };

        let checked: Vec<Option<String>> = items
            .iter()
            .enumerate()
            .map(|(index, item)| self.string(item, &child(loc, index), 0))
            .collect();
        checked.into_iter().collect()
    }
}

/// Accepts RFC 3339, naive ISO-8601 (taken as UTC), or a bare date
/// (midnight UTC).
fn parse_datetime(text: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| parse_date(text).and_then(|date| date.and_hms_opt(0, 0, 0)))
        .map(|naive| DateTime::<FixedOffset>::from(naive.and_utc()))
}

/// Unix time in seconds, or in milliseconds when the magnitude exceeds 2e10.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn from_unix_timestamp(value: f64) -> Option<DateTime<FixedOffset>> {
    let seconds = if value.abs() > 2e10 { value / 1000.0 } else { value };
    if !seconds.is_finite() {
        return None;
    }

    let whole = seconds.floor();
    let nanos = (((seconds - whole) * 1e9).round() as u32).min(999_999_999);
    DateTime::<Utc>::from_timestamp(whole as i64, nanos).map(|dt| dt.fixed_offset())
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    if text.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

/// Checks address syntax and lower-cases the domain.
fn normalize_email(text: &str) -> Result<String, &'static str> {
    let Some((local, domain)) = text.split_once('@') else {
        return Err("An email address must have an @-sign.");
    };
    if domain.contains('@') {
        return Err("The email address must have exactly one @-sign.");
    }
    if local.is_empty() {
        return Err("There must be something before the @-sign.");
    }
    if domain.is_empty() {
        return Err("There must be something after the @-sign.");
    }

    const LOCAL_SPECIALS: &str = "!#$%&'*+-/=?^_`{|}~.";
    let local_ok = local.chars().all(|ch| ch.is_alphanumeric() || LOCAL_SPECIALS.contains(ch))
        && !local.starts_with('.')
        && !local.ends_with('.')
        && !local.contains("..");
    if !local_ok {
        return Err("The email address contains invalid characters before the @-sign.");
    }

    let domain = domain.to_lowercase();
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err("The part after the @-sign is not valid. It should have a period.");
    }
    let labels_ok = labels.iter().all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|ch| ch.is_alphanumeric() || ch == '-')
    });
    if !labels_ok {
        return Err("The part after the @-sign contains invalid characters.");
    }
    let tld = labels[labels.len() - 1];
    if tld.chars().count() < 2 || !tld.chars().all(char::is_alphabetic) {
        return Err("The part after the @-sign is not valid. It is not within a valid top-level domain.");
    }

    Ok(format!("{local}@{domain}"))
}
