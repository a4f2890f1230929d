//! Field rules shared by lost and found item reports, plus the email, phone
//! and image rules reused by registration and profile edits.
//!
//! Validation never fails on decodable input: every rule violation is
//! collected into [`FieldErrors`] keyed by field name, with form-wide errors
//! under [`NON_FIELD`].

use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::ValidateEmail;

use crate::domain::item::{ItemType, ReportKind};
use crate::domain::user::Gender;

/// Key for errors that do not belong to a single field.
pub const NON_FIELD: &str = "__all__";

pub const ITEM_NAME_MIN: usize = 3;
pub const ITEM_NAME_MAX: usize = 200;
pub const COLOR_MAX: usize = 50;
pub const BRAND_MAX: usize = 100;
pub const DESCRIPTION_MIN: usize = 10;
pub const DESCRIPTION_MAX: usize = 1000;
pub const LOCATION_MIN: usize = 3;
pub const LOCATION_MAX: usize = 300;
pub const CONTACT_NAME_MAX: usize = 100;
pub const PHONE_MAX: usize = 15;
pub const USERNAME_MAX: usize = 150;
pub const NAME_MAX: usize = 150;
pub const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX_BYTES: usize = 128;
const EMAIL_MAX: usize = 254;

pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/gif"];

const REQUIRED: &str = "This field is required.";
const INVALID_EMAIL: &str = "Enter a valid email address.";
const INVALID_PHONE: &str =
    "Phone number must be entered in the format: '+999999999'. Up to 15 digits allowed.";
const UNSUPPORTED_IMAGE: &str = "Only JPEG, PNG, and GIF images are allowed.";
const CONTACT_REQUIRED: &str = "At least one contact method (email or phone) is required.";

static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+?1?\d{9,15}$").expect("Failed to compile phone regex")
});

static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\w.@+-]+$").expect("Failed to compile username regex")
});

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }
}

/// An image as it arrived in the request, before any checks.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub filename: Option<String>,
}

/// An image that passed the size and type checks.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidImage {
    pub bytes: Bytes,
    pub content_type: &'static str,
    pub extension: &'static str,
}

/// Report fields exactly as submitted. `None` means the field was not sent.
#[derive(Debug, Default, Clone)]
pub struct RawReport {
    pub item_name: Option<String>,
    pub color: Option<String>,
    pub item_type: Option<String>,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub distinctive_features: Option<String>,
    pub location: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub image: Option<UploadedImage>,
}

/// A cleaned report, ready to be stored.
#[derive(Debug, Clone)]
pub struct ReportInput {
    pub kind: ReportKind,
    pub item_name: String,
    pub item_type: ItemType,
    pub color: String,
    pub brand: Option<String>,
    pub description: String,
    pub distinctive_features: String,
    pub location: String,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub image: Option<ValidImage>,
}

/// Applies the shared report rules. `kind` only changes the wording of the
/// location errors; the rules are identical for both variants.
pub fn validate_report(
    kind: ReportKind,
    raw: RawReport,
    image_max_bytes: usize,
) -> Result<ReportInput, FieldErrors> {
    let mut errors = FieldErrors::new();

    let item_name = required(&mut errors, "item_name", raw.item_name.as_deref()).and_then(|value| {
        check_min(&mut errors, "item_name", value, ITEM_NAME_MIN, "Item name")
            .and_then(|value| check_max(&mut errors, "item_name", value, ITEM_NAME_MAX))
    });

    let color = required(&mut errors, "color", raw.color.as_deref())
        .and_then(|value| check_max(&mut errors, "color", value, COLOR_MAX));

    let item_type = required(&mut errors, "item_type", raw.item_type.as_deref()).and_then(|value| {
        let parsed = ItemType::from_db(&value);
        if parsed.is_none() {
            errors.add(
                "item_type",
                format!(
                    "Select a valid choice. {} is not one of the available choices.",
                    value
                ),
            );
        }
        parsed
    });

    let brand = optional(raw.brand.as_deref())
        .and_then(|value| check_max(&mut errors, "brand", value, BRAND_MAX));

    let description = required(&mut errors, "description", raw.description.as_deref()).and_then(|value| {
        check_min(&mut errors, "description", value, DESCRIPTION_MIN, "Description").and_then(|value| {
            let length = value.chars().count();
            if length > DESCRIPTION_MAX {
                errors.add("description", "Description cannot exceed 1000 characters.");
                None
            } else {
                Some(value)
            }
        })
    });

    let distinctive_features = optional(raw.distinctive_features.as_deref()).unwrap_or_default();

    let location = match optional(raw.location.as_deref()) {
        Some(value) => check_min(&mut errors, "location", value, LOCATION_MIN, "Location")
            .and_then(|value| check_max(&mut errors, "location", value, LOCATION_MAX)),
        None => {
            errors.add("location", format!("{} is required.", kind.location_label()));
            None
        }
    };

    let contact_name = required(&mut errors, "contact_name", raw.contact_name.as_deref())
        .and_then(|value| check_max(&mut errors, "contact_name", value, CONTACT_NAME_MAX));

    let contact_email = required(&mut errors, "contact_email", raw.contact_email.as_deref())
        .and_then(|value| match normalize_email(&value) {
            Ok(email) => Some(email),
            Err(message) => {
                errors.add("contact_email", message);
                None
            }
        });

    let contact_phone = required(&mut errors, "contact_phone", raw.contact_phone.as_deref())
        .and_then(|value| match normalize_phone(&value) {
            Ok(phone) => Some(phone),
            Err(message) => {
                errors.add("contact_phone", message);
                None
            }
        });

    let image = match raw.image {
        Some(image) => match validate_image(image, image_max_bytes) {
            Ok(image) => Some(image),
            Err(message) => {
                errors.add("image", message);
                None
            }
        },
        None => None,
    };

    if contact_email.is_none() && contact_phone.is_none() {
        errors.add(NON_FIELD, CONTACT_REQUIRED);
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    match (
        item_name,
        color,
        item_type,
        description,
        location,
        contact_name,
        contact_email,
        contact_phone,
    ) {
        (
            Some(item_name),
            Some(color),
            Some(item_type),
            Some(description),
            Some(location),
            Some(contact_name),
            Some(contact_email),
            Some(contact_phone),
        ) => Ok(ReportInput {
            kind,
            item_name,
            item_type,
            color,
            brand,
            description,
            distinctive_features,
            location,
            contact_name,
            contact_email,
            contact_phone,
            image,
        }),
        _ => Err(errors),
    }
}

/// Registration fields as submitted.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawRegistration {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub gender: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub gender: Gender,
}

pub fn validate_registration(raw: RawRegistration) -> Result<Registration, FieldErrors> {
    let mut errors = FieldErrors::new();

    let username = required(&mut errors, "username", raw.username.as_deref()).and_then(|value| {
        if !USERNAME_REGEX.is_match(&value) {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
            return None;
        }
        check_max(&mut errors, "username", value, USERNAME_MAX)
    });

    let email = required(&mut errors, "email", raw.email.as_deref()).and_then(|value| {
        normalize_email(&value)
            .map_err(|message| errors.add("email", message))
            .ok()
    });

    // Passwords are taken verbatim; surrounding whitespace is significant.
    let password = match raw.password.filter(|value| !value.trim().is_empty()) {
        Some(value) if value.chars().count() < PASSWORD_MIN => {
            errors.add("password", "Password must be at least 8 characters long.");
            None
        }
        Some(value) if value.len() > PASSWORD_MAX_BYTES => {
            errors.add("password", "Password must be at most 128 characters long.");
            None
        }
        Some(value) => Some(value),
        None => {
            errors.add("password", REQUIRED);
            None
        }
    };

    let first_name = optional(raw.first_name.as_deref())
        .and_then(|value| check_max(&mut errors, "first_name", value, NAME_MAX))
        .unwrap_or_default();
    let last_name = optional(raw.last_name.as_deref())
        .and_then(|value| check_max(&mut errors, "last_name", value, NAME_MAX))
        .unwrap_or_default();

    let phone_number = required(&mut errors, "phone_number", raw.phone_number.as_deref())
        .and_then(|value| {
            normalize_phone(&value)
                .map_err(|message| errors.add("phone_number", message))
                .ok()
        });

    let gender = parse_gender(&mut errors, raw.gender.as_deref());

    if !errors.is_empty() {
        return Err(errors);
    }

    match (username, email, password, phone_number, gender) {
        (Some(username), Some(email), Some(password), Some(phone_number), Some(gender)) => {
            Ok(Registration {
                username,
                email,
                password,
                first_name,
                last_name,
                phone_number,
                gender,
            })
        }
        _ => Err(errors),
    }
}

/// Profile fields as submitted. Absent fields are left unchanged.
#[derive(Debug, Default, Clone)]
pub struct RawProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub gender: Option<String>,
    pub profile_image: Option<UploadedImage>,
}

#[derive(Debug, Default, Clone)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub gender: Option<Gender>,
    pub profile_image: Option<ValidImage>,
}

pub fn validate_profile(raw: RawProfile, image_max_bytes: usize) -> Result<ProfileUpdate, FieldErrors> {
    let mut errors = FieldErrors::new();

    let first_name = raw
        .first_name
        .map(|value| value.trim().to_string())
        .and_then(|value| check_max(&mut errors, "first_name", value, NAME_MAX));
    let last_name = raw
        .last_name
        .map(|value| value.trim().to_string())
        .and_then(|value| check_max(&mut errors, "last_name", value, NAME_MAX));

    let email = raw.email.and_then(|value| {
        required(&mut errors, "email", Some(value.as_str())).and_then(|value| {
            normalize_email(&value)
                .map_err(|message| errors.add("email", message))
                .ok()
        })
    });

    let phone_number = raw.phone_number.and_then(|value| {
        required(&mut errors, "phone_number", Some(value.as_str())).and_then(|value| {
            normalize_phone(&value)
                .map_err(|message| errors.add("phone_number", message))
                .ok()
        })
    });

    let gender = match raw.gender {
        Some(value) => parse_gender(&mut errors, Some(value.as_str())),
        None => None,
    };

    let profile_image = match raw.profile_image {
        Some(image) => validate_image(image, image_max_bytes)
            .map_err(|message| errors.add("profile_image", message))
            .ok(),
        None => None,
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ProfileUpdate {
        first_name,
        last_name,
        email,
        phone_number,
        gender,
        profile_image,
    })
}

fn parse_gender(errors: &mut FieldErrors, value: Option<&str>) -> Option<Gender> {
    let value = value.unwrap_or_default();
    let gender = Gender::parse(value);
    if gender.is_none() {
        errors.add(
            "gender",
            format!(
                "Select a valid choice. {} is not one of the available choices.",
                value.trim()
            ),
        );
    }
    gender
}

/// Trims and lowercases an email after checking its syntax.
pub fn normalize_email(raw: &str) -> Result<String, &'static str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > EMAIL_MAX || !trimmed.validate_email() {
        return Err(INVALID_EMAIL);
    }
    Ok(trimmed.to_lowercase())
}

/// Strips spaces and dashes, then checks the phone pattern.
pub fn normalize_phone(raw: &str) -> Result<String, &'static str> {
    let phone: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .collect();
    if phone.chars().count() > PHONE_MAX || !PHONE_REGEX.is_match(&phone) {
        return Err(INVALID_PHONE);
    }
    Ok(phone)
}

/// Size is checked before type, so an oversized file is rejected whatever it
/// claims to be. The format always comes from the leading bytes; a declared
/// content type must agree with it.
pub fn validate_image(image: UploadedImage, max_bytes: usize) -> Result<ValidImage, String> {
    if image.bytes.is_empty() {
        return Err("The submitted file is empty.".to_string());
    }
    if image.bytes.len() > max_bytes {
        return Err(format!(
            "Image file size cannot exceed {}MB.",
            max_bytes / (1024 * 1024)
        ));
    }

    let Some((content_type, extension)) = sniff_image_type(&image.bytes) else {
        return Err(UNSUPPORTED_IMAGE.to_string());
    };

    let declared = image
        .content_type
        .as_deref()
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty() && value != "application/octet-stream");
    if let Some(declared) = declared {
        let declared = if declared == "image/jpg" {
            "image/jpeg".to_string()
        } else {
            declared
        };
        if declared != content_type {
            return Err(UNSUPPORTED_IMAGE.to_string());
        }
    }

    Ok(ValidImage {
        bytes: image.bytes,
        content_type,
        extension,
    })
}

fn sniff_image_type(bytes: &[u8]) -> Option<(&'static str, &'static str)> {
    match image::guess_format(bytes).ok()? {
        image::ImageFormat::Jpeg => Some(("image/jpeg", "jpg")),
        image::ImageFormat::Png => Some(("image/png", "png")),
        image::ImageFormat::Gif => Some(("image/gif", "gif")),
        _ => None,
    }
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn required(errors: &mut FieldErrors, field: &str, value: Option<&str>) -> Option<String> {
    let value = optional(value);
    if value.is_none() {
        errors.add(field, REQUIRED);
    }
    value
}

fn check_min(
    errors: &mut FieldErrors,
    field: &str,
    value: String,
    min: usize,
    label: &str,
) -> Option<String> {
    if value.chars().count() < min {
        errors.add(
            field,
            format!("{} must be at least {} characters long.", label, min),
        );
        return None;
    }
    Some(value)
}

fn check_max(errors: &mut FieldErrors, field: &str, value: String, max: usize) -> Option<String> {
    let length = value.chars().count();
    if length > max {
        errors.add(
            field,
            format!(
                "Ensure this value has at most {} characters (it has {}).",
                max, length
            ),
        );
        return None;
    }
    Some(value)
}
