//! Form validation
//!
//! Each submitted form is a plain struct checked with `validator` plus a few
//! hand-written rules. Validation either yields a cleaned value or a
//! [`FormErrors`] carrying per-field messages and the submitted input, which
//! handlers send back so the client can re-render the form.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::storage::ImageUpload;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Usernames that collide with fixed routes under `/users/`
const RESERVED_USERNAMES: &[&str] = &["login", "logout", "signup", "me"];

/// Field errors for a rejected form
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct FormErrors {
    /// Messages keyed by field name
    pub errors: BTreeMap<String, Vec<String>>,
    /// Submitted input, minus secrets
    pub values: BTreeMap<String, String>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Flag `field` as required when `value` is blank.
    fn require(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, REQUIRED);
        }
    }

    /// Merge `validator` output, skipping fields that already failed the
    /// required check so a blank field reports a single message.
    fn merge(&mut self, result: Result<(), ValidationErrors>) {
        let Err(errors) = result else {
            return;
        };

        for (field, field_errors) in errors.field_errors() {
            let field = field.to_string();
            if self.has(&field) {
                continue;
            }
            for error in field_errors {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value ({})", error.code));
                self.add(&field, message);
            }
        }
    }

    fn value(&mut self, field: &str, value: &str) {
        self.values.insert(field.to_string(), value.to_string());
    }

    fn into_result(self) -> Result<(), FormErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

// =============================================================================
// Login
// =============================================================================

/// Login form (urlencoded)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Where to go after a successful login
    pub next: Option<String>,
}

impl LoginForm {
    /// Redirect target after login
    ///
    /// Only local absolute paths are honoured; anything else falls back to
    /// the feed.
    pub fn redirect_target(&self) -> String {
        match self.next.as_deref().map(str::trim) {
            Some(next) if is_local_path(next) => next.to_string(),
            _ => "/".to_string(),
        }
    }
}

/// Whether `path` stays on this site once resolved
pub(crate) fn is_local_path(path: &str) -> bool {
    const BASE: &str = "http://platzigram.invalid/";

    if !path.starts_with('/') || path.starts_with("//") || path.contains('\\') {
        return false;
    }
    let Ok(base) = url::Url::parse(BASE) else {
        return false;
    };
    base.join(path)
        .map(|resolved| resolved.origin() == base.origin())
        .unwrap_or(false)
}

// =============================================================================
// Signup
// =============================================================================

/// Signup form (urlencoded)
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SignupForm {
    #[serde(default)]
    #[validate(length(
        min = 4,
        max = 50,
        message = "Ensure this value has between 4 and 50 characters."
    ))]
    pub username: String,

    #[serde(default)]
    #[validate(length(max = 70, message = "Ensure this value has at most 70 characters."))]
    pub password: String,

    #[serde(default)]
    #[validate(length(max = 70, message = "Ensure this value has at most 70 characters."))]
    pub password_confirmation: String,

    #[serde(default)]
    #[validate(length(
        min = 2,
        max = 50,
        message = "Ensure this value has between 2 and 50 characters."
    ))]
    pub first_name: String,

    #[serde(default)]
    #[validate(length(
        min = 2,
        max = 50,
        message = "Ensure this value has between 2 and 50 characters."
    ))]
    pub last_name: String,

    #[serde(default)]
    #[validate(
        length(
            min = 6,
            max = 70,
            message = "Ensure this value has between 6 and 70 characters."
        ),
        email(message = "Enter a valid email address.")
    )]
    pub email: String,
}

/// Signup data that passed field validation
///
/// Uniqueness still has to be checked against the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl SignupForm {
    /// Validate fields and password confirmation.
    pub fn into_valid(self) -> Result<NewUser, FormErrors> {
        let form = SignupForm {
            username: self.username.trim().to_string(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            ..self
        };

        let mut errors = FormErrors::new();
        errors.value("username", &form.username);
        errors.value("first_name", &form.first_name);
        errors.value("last_name", &form.last_name);
        errors.value("email", &form.email);

        errors.require("username", &form.username);
        errors.require("password", &form.password);
        errors.require("password_confirmation", &form.password_confirmation);
        errors.require("first_name", &form.first_name);
        errors.require("last_name", &form.last_name);
        errors.require("email", &form.email);
        errors.merge(form.validate());

        if !errors.has("username")
            && RESERVED_USERNAMES
                .iter()
                .any(|reserved| reserved.eq_ignore_ascii_case(&form.username))
        {
            errors.add("username", "This username is not available.");
        }

        if !errors.has("password")
            && !errors.has("password_confirmation")
            && form.password != form.password_confirmation
        {
            errors.add("password_confirmation", "Passwords do not match.");
        }

        errors.into_result()?;

        Ok(NewUser {
            username: form.username,
            password: form.password,
            first_name: form.first_name,
            last_name: form.last_name,
            email: form.email,
        })
    }
}

impl NewUser {
    /// Error set used when the store reports a taken username or email.
    pub fn errors(&self) -> FormErrors {
        let mut errors = FormErrors::new();
        errors.value("username", &self.username);
        errors.value("first_name", &self.first_name);
        errors.value("last_name", &self.last_name);
        errors.value("email", &self.email);
        errors
    }
}

// =============================================================================
// Profile
// =============================================================================

/// Profile update form (text parts of the multipart body)
#[derive(Debug, Clone, Default, Validate)]
pub struct ProfileForm {
    #[validate(
        length(max = 200, message = "Ensure this value has at most 200 characters."),
        url(message = "Enter a valid URL.")
    )]
    pub website: String,

    #[validate(length(max = 500, message = "Ensure this value has at most 500 characters."))]
    pub biography: String,

    #[validate(length(max = 20, message = "Ensure this value has at most 20 characters."))]
    pub phone_number: String,
}

/// Validated profile changes
#[derive(Debug, Clone)]
pub struct ProfileChanges {
    pub website: String,
    pub biography: String,
    pub phone_number: String,
    /// New picture, if one was uploaded
    pub picture: Option<ImageUpload>,
}

impl ProfileForm {
    /// Validate text fields together with the picture check result.
    ///
    /// `picture` is `None` when no file was sent, `Some(Err(_))` when the
    /// file was not a usable image.
    pub fn into_valid(
        self,
        picture: Option<Result<ImageUpload, String>>,
    ) -> Result<ProfileChanges, FormErrors> {
        let form = ProfileForm {
            website: self.website.trim().to_string(),
            biography: self.biography.trim().to_string(),
            phone_number: self.phone_number.trim().to_string(),
        };

        let mut errors = FormErrors::new();
        errors.value("website", &form.website);
        errors.value("biography", &form.biography);
        errors.value("phone_number", &form.phone_number);

        errors.require("website", &form.website);
        errors.merge(form.validate());

        let picture = match picture {
            Some(Ok(image)) => Some(image),
            Some(Err(message)) => {
                errors.add("picture", message);
                None
            }
            None => None,
        };

        errors.into_result()?;

        Ok(ProfileChanges {
            website: form.website,
            biography: form.biography,
            phone_number: form.phone_number,
            picture,
        })
    }
}

// =============================================================================
// Post
// =============================================================================

/// New post form (text parts of the multipart body)
#[derive(Debug, Clone, Default, Validate)]
pub struct PostForm {
    #[validate(length(max = 255, message = "Ensure this value has at most 255 characters."))]
    pub title: String,
}

/// Validated post input
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub photo: ImageUpload,
}

impl PostForm {
    /// Validate the title together with the required photo.
    pub fn into_valid(
        self,
        photo: Option<Result<ImageUpload, String>>,
    ) -> Result<NewPost, FormErrors> {
        let title = self.title.trim().to_string();
        let form = PostForm {
            title: title.clone(),
        };

        let mut errors = FormErrors::new();
        errors.value("title", &title);
        errors.require("title", &title);
        errors.merge(form.validate());

        match photo.unwrap_or_else(|| Err(REQUIRED.to_string())) {
            Ok(photo) => {
                errors.into_result()?;
                Ok(NewPost { title, photo })
            }
            Err(message) => {
                errors.add("photo", message);
                Err(errors)
            }
        }
    }
}
