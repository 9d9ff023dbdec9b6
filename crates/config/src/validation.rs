//! Per-section validation
//!
//! A section reports problems into a [`Checks`] accumulator, so one pass
//! surfaces every bad field instead of stopping at the first.

use std::fmt::Display;
use std::ops::RangeInclusive;

pub use crate::error::ValidationError;

/// A top-level table of the config file
pub trait ConfigSection: Default {
    /// Table name, used as the prefix of every reported field
    const NAME: &'static str;

    fn check(&self, checks: &mut Checks);

    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut checks = Checks::for_section(Self::NAME);
        self.check(&mut checks);
        checks.into_result()
    }
}

/// Accumulates validation failures for one section
#[derive(Debug)]
pub struct Checks {
    section: &'static str,
    errors: Vec<ValidationError>,
}

impl Checks {
    pub fn for_section(section: &'static str) -> Self {
        Self {
            section,
            errors: Vec::new(),
        }
    }

    fn field(&self, name: &str) -> String {
        format!("{}.{}", self.section, name)
    }

    /// `value` must lie within `bounds`, inclusive
    pub fn range<T>(&mut self, name: &str, value: T, bounds: RangeInclusive<T>) -> &mut Self
    where
        T: PartialOrd + Display,
    {
        if !bounds.contains(&value) {
            let field = self.field(name);
            let message = format!("must be between {} and {}", bounds.start(), bounds.end());
            self.errors.push(ValidationError::with_value(field, message, value));
        }
        self
    }

    /// `value` must be an absolute http(s) URL with a host
    pub fn http_url(&mut self, name: &str, value: &str) -> &mut Self {
        let rest = value
            .strip_prefix("https://")
            .or_else(|| value.strip_prefix("http://"));
        let has_host = matches!(rest, Some(r) if !r.is_empty() && !r.starts_with('/'));

        if !has_host {
            let field = self.field(name);
            self.errors.push(ValidationError::with_value(
                field,
                "must be an http:// or https:// URL",
                value,
            ));
        }
        self
    }

    /// Records `message` against `name` unless `ok` holds
    pub fn ensure(&mut self, ok: bool, name: &str, message: &str) -> &mut Self {
        if !ok {
            let field = self.field(name);
            self.errors.push(ValidationError::new(field, message));
        }
        self
    }

    pub fn into_result(self) -> Result<(), Vec<ValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}
