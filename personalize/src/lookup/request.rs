//! Query shapes accepted by the Personalization API and URL construction.

use std::borrow::Cow;

use serde::Serialize;
use sha1::{Digest, Sha1};
use url::{form_urlencoded, Url};

/// Endpoint queried when no other base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://personalize.rapleaf.com/v4/dr";

/// Query parameter carrying the access key.
pub const API_KEY_FIELD: &str = "api_key";

const EMAIL_FIELD: &str = "email";

/// One lookup request. Each variant is one of the fact patterns the service
/// accepts, so a request can never mix shapes.
///
/// Prefer the constructors over building variants by hand: they lower-case
/// emails and drop empty optional emails. [`QueryRequest::fields`] applies
/// the same normalization again, so hand-built values are still sent
/// correctly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryRequest {
    Email {
        email: String,
    },
    Md5 {
        md5_email: String,
    },
    Sha1 {
        sha1_email: String,
    },
    NameAndPostal {
        first_name: String,
        last_name: String,
        street: String,
        city: String,
        state: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        email: Option<String>,
    },
    NameAndZip {
        first_name: String,
        last_name: String,
        /// 5-digit zip and 4-digit extension separated by a dash.
        zip4: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        email: Option<String>,
    },
}

impl QueryRequest {
    /// Lookup by plain email address.
    #[must_use]
    pub fn email(email: &str) -> Self {
        Self::Email {
            email: normalize_email(email).into_owned(),
        }
    }

    /// Lookup by the SHA-1 digest of the lower-cased email, so the address
    /// itself never leaves the process.
    #[must_use]
    pub fn hashed_email(email: &str) -> Self {
        Self::sha1(&sha1_hex(&normalize_email(email)))
    }

    /// Lookup by an MD5 hex digest of an email. The digest is not validated.
    #[must_use]
    pub fn md5(md5_email: &str) -> Self {
        Self::Md5 {
            md5_email: md5_email.to_string(),
        }
    }

    /// Lookup by a SHA-1 hex digest of an email. The digest is not validated.
    #[must_use]
    pub fn sha1(sha1_email: &str) -> Self {
        Self::Sha1 {
            sha1_email: sha1_email.to_string(),
        }
    }

    /// Lookup by name and postal address (street, city, state acronym).
    /// An email is optional but raises the hit rate.
    #[must_use]
    pub fn name_and_postal(
        first_name: &str,
        last_name: &str,
        street: &str,
        city: &str,
        state: &str,
        email: Option<&str>,
    ) -> Self {
        Self::NameAndPostal {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            street: street.to_string(),
            city: city.to_string(),
            state: state.to_string(),
            email: normalize_optional_email(email),
        }
    }

    /// Lookup by name and zip+4 code. An email is optional but raises the
    /// hit rate.
    #[must_use]
    pub fn name_and_zip(
        first_name: &str,
        last_name: &str,
        zip4: &str,
        email: Option<&str>,
    ) -> Self {
        Self::NameAndZip {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            zip4: zip4.to_string(),
            email: normalize_optional_email(email),
        }
    }

    /// Wire fields in transmission order, values not yet encoded.
    #[must_use]
    pub fn fields(&self) -> Vec<(&'static str, Cow<'_, str>)> {
        match self {
            Self::Email { email } => vec![(EMAIL_FIELD, normalize_email(email))],
            Self::Md5 { md5_email } => vec![("md5_email", Cow::Borrowed(md5_email.as_str()))],
            Self::Sha1 { sha1_email } => {
                vec![("sha1_email", Cow::Borrowed(sha1_email.as_str()))]
            }
            Self::NameAndPostal {
                first_name,
                last_name,
                street,
                city,
                state,
                email,
            } => {
                let mut fields = vec![
                    ("first_name", Cow::Borrowed(first_name.as_str())),
                    ("last_name", Cow::Borrowed(last_name.as_str())),
                    ("street", Cow::Borrowed(street.as_str())),
                    ("city", Cow::Borrowed(city.as_str())),
                    ("state", Cow::Borrowed(state.as_str())),
                ];
                push_optional_email(&mut fields, email.as_deref());
                fields
            }
            Self::NameAndZip {
                first_name,
                last_name,
                zip4,
                email,
            } => {
                let mut fields = vec![
                    ("first_name", Cow::Borrowed(first_name.as_str())),
                    ("last_name", Cow::Borrowed(last_name.as_str())),
                    ("zip4", Cow::Borrowed(zip4.as_str())),
                ];
                push_optional_email(&mut fields, email.as_deref());
                fields
            }
        }
    }
}

/// Build the full request URL for `request`.
///
/// Values go through two form-encoding passes: one over the request fields,
/// then the query-string serialization itself. `email` skips the first pass
/// and `api_key` is appended after it, so both end up encoded exactly once
/// while every other value is encoded twice (`1 Main St` becomes
/// `1%2BMain%2BSt`). The service expects this layout.
#[must_use]
pub fn build_url(base_url: &str, api_key: &str, request: &QueryRequest) -> String {
    let mut params: Vec<(&str, Cow<'_, str>)> = request
        .fields()
        .into_iter()
        .map(|(name, value)| {
            if name == EMAIL_FIELD {
                (name, value)
            } else {
                (name, Cow::Owned(form_encode(&value)))
            }
        })
        .collect();
    params.push((API_KEY_FIELD, Cow::Borrowed(api_key)));

    let query = params
        .iter()
        .map(|(name, value)| format!("{}={}", form_encode(name), form_encode(value)))
        .collect::<Vec<_>>()
        .join("&");

    format!("{base_url}?{query}")
}

/// `application/x-www-form-urlencoded` encoding of one value: space becomes
/// `+`, everything except ASCII alphanumerics and `-_.` is percent-encoded.
fn form_encode(value: &str) -> String {
    // byte_serialize leaves `*` bare; it is the only such byte in its output.
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('*', "%2A")
}

/// Whether `value` parses as an absolute `http` or `https` URL.
#[must_use]
pub fn is_http_url(value: &str) -> bool {
    Url::parse(value).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

/// Lower-case hex SHA-1 digest of `input`.
#[must_use]
pub fn sha1_hex(input: &str) -> String {
    format!("{:x}", Sha1::digest(input.as_bytes()))
}

/// ASCII-only lower-casing; non-ASCII bytes are left untouched.
pub(crate) fn normalize_email(email: &str) -> Cow<'_, str> {
    if email.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(email.to_ascii_lowercase())
    } else {
        Cow::Borrowed(email)
    }
}

fn normalize_optional_email(email: Option<&str>) -> Option<String> {
    email
        .filter(|e| !e.is_empty())
        .map(|e| normalize_email(e).into_owned())
}

fn push_optional_email<'a>(
    fields: &mut Vec<(&'static str, Cow<'a, str>)>,
    email: Option<&'a str>,
) {
    if let Some(email) = email.filter(|e| !e.is_empty()) {
        fields.push((EMAIL_FIELD, normalize_email(email)));
    }
}
