use super::coordinates::{self, Coordinates};
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString, IntoStaticStr, VariantArray};

pub const NAME_MAX_LENGTH: usize = 255;
pub const EXPLOITATION_MAX_LENGTH: usize = 255;
// Older deployments defaulted to a fixed farm name, new plots start blank
pub const DEFAULT_EXPLOITATION: &str = "";

pub const CROP_TYPE_CHOICES: [&str; 5] = ["", "cereals", "vegetables", "fruits", "other"];

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Display,
    IntoStaticStr,
    EnumString,
    VariantArray,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CropType {
    Cereals,
    Vegetables,
    Fruits,
    Other,
}

impl CropType {
    /// Blank text means the crop type was left unspecified.
    pub fn parse_blank(value: &str) -> Result<Option<CropType>, strum::ParseError> {
        if value.is_empty() {
            Ok(None)
        } else {
            value.parse().map(Some)
        }
    }

    pub fn as_blank_str(value: Option<CropType>) -> &'static str {
        value.map(Into::into).unwrap_or_default()
    }
}

/// Wire representation of an optional crop type, where a missing value is `""`.
pub mod blank_crop_type {
    use super::CropType;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<CropType>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(CropType::as_blank_str(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<CropType>, D::Error> {
        let value = String::deserialize(deserializer)?;
        CropType::parse_blank(&value).map_err(D::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Integer,
    String,
    Geometry,
    Float,
    Choice,
    Boolean,
    Datetime,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldDefault {
    Text(&'static str),
    Boolean(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub required: bool,
    pub read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "no_choices")]
    pub choices: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<FieldDefault>,
}

fn no_choices(choices: &&[&str]) -> bool {
    choices.is_empty()
}

impl FieldSpec {
    const fn new(name: &'static str, kind: FieldKind) -> Self {
        FieldSpec {
            name,
            kind,
            required: false,
            read_only: false,
            max_length: None,
            choices: &[],
            default: None,
        }
    }

    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    const fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    const fn choices(mut self, choices: &'static [&'static str]) -> Self {
        self.choices = choices;
        self
    }

    const fn default(mut self, default: FieldDefault) -> Self {
        self.default = Some(default);
        self
    }
}

pub const ID: &str = "id";
pub const NAME: &str = "name";
pub const COORDINATES: &str = coordinates::FIELD;
pub const AREA: &str = "area";
pub const EXPLOITATION: &str = "exploitation";
pub const CROP_TYPE: &str = "crop_type";
pub const HAS_MANAGER: &str = "has_manager";
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// Every field a plot exposes, with the constraints enforced on input.
pub static FIELDS: [FieldSpec; 9] = [
    FieldSpec::new(ID, FieldKind::Integer).read_only(),
    FieldSpec::new(NAME, FieldKind::String)
        .required()
        .max_length(NAME_MAX_LENGTH),
    FieldSpec::new(COORDINATES, FieldKind::Geometry).required(),
    FieldSpec::new(AREA, FieldKind::Float).required(),
    FieldSpec::new(EXPLOITATION, FieldKind::String)
        .max_length(EXPLOITATION_MAX_LENGTH)
        .default(FieldDefault::Text(DEFAULT_EXPLOITATION)),
    FieldSpec::new(CROP_TYPE, FieldKind::Choice)
        .choices(&CROP_TYPE_CHOICES)
        .default(FieldDefault::Text("")),
    FieldSpec::new(HAS_MANAGER, FieldKind::Boolean).default(FieldDefault::Boolean(false)),
    FieldSpec::new(CREATED_AT, FieldKind::Datetime).read_only(),
    FieldSpec::new(UPDATED_AT, FieldKind::Datetime).read_only(),
];

pub fn field(name: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|it| it.name == name)
}

/// Whether fields marked as required have to be present in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Full,
    Partial,
}

/// Validated input. `None` means the field was not supplied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotChanges {
    pub name: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub area: Option<f64>,
    pub exploitation: Option<String>,
    pub crop_type: Option<Option<CropType>>,
    pub has_manager: Option<bool>,
}

impl PlotChanges {
    /// Validates raw request fields. Read-only and unknown keys are ignored.
    /// All field errors are collected before returning.
    pub fn validate(raw: &Map<String, Value>, presence: Presence) -> Result<Self, ValidationError> {
        let mut errors = ValidationError::new();
        let name = scalar(raw, NAME, presence, &mut errors, |value, spec| {
            let value = value.as_str().ok_or("Not a valid string.")?.trim();
            if value.is_empty() {
                return Err("This field may not be blank.".into());
            }
            check_length(value, spec)?;
            Ok(value.to_string())
        });
        let coordinates = present(raw, COORDINATES, presence, &mut errors).and_then(|value| {
            Coordinates::decode(value)
                .map_err(|e| errors.merge(e))
                .ok()
        });
        let area = scalar(raw, AREA, presence, &mut errors, |value, _| {
            let value = value.as_f64().ok_or("A valid number is required.")?;
            if !value.is_finite() {
                return Err("A valid number is required.".into());
            }
            if value < 0.0 {
                return Err("Ensure this value is greater than or equal to 0.".into());
            }
            Ok(value)
        });
        let exploitation = scalar(raw, EXPLOITATION, presence, &mut errors, |value, spec| {
            let value = value.as_str().ok_or("Not a valid string.")?.trim();
            check_length(value, spec)?;
            Ok(value.to_string())
        });
        let crop_type = scalar(raw, CROP_TYPE, presence, &mut errors, |value, _| {
            let value = value.as_str().ok_or("Not a valid string.")?;
            CropType::parse_blank(value).map_err(|_| format!("\"{value}\" is not a valid choice."))
        });
        let has_manager = scalar(raw, HAS_MANAGER, presence, &mut errors, |value, _| {
            value
                .as_bool()
                .ok_or_else(|| "Must be a valid boolean.".to_string())
        });
        errors.into_result()?;
        Ok(PlotChanges {
            name,
            coordinates,
            area,
            exploitation,
            crop_type,
            has_manager,
        })
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        *self == PlotChanges::default()
    }
}

/// A plot that passed validation and is ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPlot {
    pub name: String,
    pub coordinates: Coordinates,
    pub area: f64,
    pub exploitation: String,
    pub crop_type: Option<CropType>,
    pub has_manager: bool,
}

impl TryFrom<PlotChanges> for NewPlot {
    type Error = ValidationError;

    fn try_from(changes: PlotChanges) -> Result<Self, Self::Error> {
        let mut errors = ValidationError::new();
        if changes.name.is_none() {
            errors.add(NAME, REQUIRED);
        }
        if changes.coordinates.is_none() {
            errors.add(COORDINATES, REQUIRED);
        }
        if changes.area.is_none() {
            errors.add(AREA, REQUIRED);
        }
        match (changes.name, changes.coordinates, changes.area) {
            (Some(name), Some(coordinates), Some(area)) => Ok(NewPlot {
                name,
                coordinates,
                area,
                exploitation: changes
                    .exploitation
                    .unwrap_or_else(|| DEFAULT_EXPLOITATION.into()),
                crop_type: changes.crop_type.flatten(),
                has_manager: changes.has_manager.unwrap_or_default(),
            }),
            _ => Err(errors),
        }
    }
}

const REQUIRED: &str = "This field is required.";

fn present<'a>(
    raw: &'a Map<String, Value>,
    name: &str,
    presence: Presence,
    errors: &mut ValidationError,
) -> Option<&'a Value> {
    let value = raw.get(name);
    let required = field(name).is_some_and(|it| it.required);
    if value.is_none() && required && presence == Presence::Full {
        errors.add(name, REQUIRED);
    }
    value
}

fn scalar<T>(
    raw: &Map<String, Value>,
    name: &'static str,
    presence: Presence,
    errors: &mut ValidationError,
    parse: impl FnOnce(&Value, &FieldSpec) -> Result<T, String>,
) -> Option<T> {
    let value = present(raw, name, presence, errors)?;
    if value.is_null() {
        errors.add(name, "This field may not be null.");
        return None;
    }
    let spec = field(name)?;
    parse(value, spec).map_err(|e| errors.add(name, e)).ok()
}

fn check_length(value: &str, spec: &FieldSpec) -> Result<(), String> {
    match spec.max_length {
        Some(max) if value.chars().count() > max => Err(format!(
            "Ensure this field has no more than {max} characters."
        )),
        _ => Ok(()),
    }
}
