use crate::handler::ContactFormError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A contact form submission as received from the website.
///
/// Every field is optional at this stage; [`Submission::validate`] decides whether the
/// submission is complete.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub project_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub budget: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: Option<String>,
}

impl Submission {
    /// Decodes a request body, returning the submission together with the raw JSON so that it
    /// can be recorded as received.
    ///
    /// Anything other than a non-empty JSON object is treated as if no data had been sent.
    pub fn from_json(body: &[u8]) -> Result<(Self, Value), ContactFormError> {
        let raw: Value =
            serde_json::from_slice(body).map_err(|_| ContactFormError::MissingPayload)?;
        match &raw {
            Value::Object(fields) if !fields.is_empty() => {}
            _ => return Err(ContactFormError::MissingPayload),
        }
        let submission = Self::deserialize(&raw).map_err(|_| ContactFormError::MissingPayload)?;
        Ok((submission, raw))
    }

    pub fn validate(&self) -> Result<ValidatedSubmission, ContactFormError> {
        let Submission {
            name: Some(name),
            email: Some(email),
            phone,
            project_type: Some(project_type),
            budget,
            start_date,
            message: Some(message),
        } = self
        else {
            return Err(ContactFormError::MissingFields(self.missing_fields()));
        };

        Ok(ValidatedSubmission {
            name,
            email,
            phone: phone.as_deref(),
            project_type,
            budget: budget.as_deref(),
            start_date: start_date.as_deref(),
            message,
        })
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("email", &self.email),
            ("projectType", &self.project_type),
            ("message", &self.message),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(field, _)| field)
        .collect()
    }
}

pub struct ValidatedSubmission<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub project_type: &'a str,
    pub budget: Option<&'a str>,
    pub start_date: Option<&'a str>,
    pub message: &'a str,
}

// Form widgets occasionally send numbers; empty strings and other JSON types count as absent.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) if !text.is_empty() => Some(text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}
