use predicates::Predicate;
use crate::schema::{InputSource, RequestMode};
use crate::{Profile, ValidationError};

pub const MAX_CONCURRENCY: u32 = 1000;
pub const MAX_DURATION_SEC: u32 = 86_400;

enum ProfileVersion {
    V1 = 1,
}

impl TryFrom<u16> for ProfileVersion {
    type Error = ();
    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ProfileVersion::V1),
            _ => Err(()),
        }
    }
}

pub struct Validator {
    rules: Vec<Box<dyn Rule>>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Validator with every business rule a runnable profile must satisfy.
    pub fn standard() -> Self {
        Validator::new()
            .with_rule(NameRule::new())
            .with_rule(VersionRule::new())
            .with_rule(WebProtocolRule::new())
            .with_rule(ConcurrencyRule::new())
            .with_rule(DurationRule::new())
            .with_rule(WindowCapacityRule::new())
            .with_rule(ThresholdsRule::new())
            .with_rule(TimeoutRule::new())
            .with_rule(InputsRule::new())
    }

    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn validate(&self, v: &serde_json::Value, errors: &mut Vec<ValidationError>) {
        let profile: Profile = match serde_json::from_value(v.clone()) {
            Ok(v) => v,
            Err(e) => {
                errors.push(ValidationError {
                    path: "".to_string(),
                    code: "json_parse_error".to_string(),
                    message: format!("Failed to parse JSON: {}", e),
                });
                return;
            }
        };
        self.validate_profile(&profile, errors);
    }

    pub fn validate_profile(&self, profile: &Profile, errors: &mut Vec<ValidationError>) {
        for r in &self.rules {
            r.validate(profile, errors);
        }
    }
}

pub trait Rule: Send + Sync {
    fn validate(&self, v: &Profile, errors: &mut Vec<ValidationError>);
}

fn error(path: &str, code: &str, message: &str) -> ValidationError {
    ValidationError {
        path: path.to_string(),
        code: code.to_string(),
        message: message.to_string(),
    }
}

pub(crate) struct NameRule {
    message: String,
}

impl NameRule {
    pub(crate) fn new() -> Self {
        NameRule { message: "name is required and must not be empty".to_string() }
    }
}

impl Rule for NameRule {
    fn validate(&self, profile: &Profile, errors: &mut Vec<ValidationError>) {
        if profile.name.trim().is_empty() {
            errors.push(error("/name", "required", &self.message));
        }
    }
}

pub(crate) struct VersionRule;

impl VersionRule {
    pub(crate) fn new() -> Self {
        VersionRule
    }
}

impl Rule for VersionRule {
    fn validate(&self, profile: &Profile, errors: &mut Vec<ValidationError>) {
        if ProfileVersion::try_from(profile.version).is_err() {
            errors.push(error(
                "/version",
                "unsupported",
                &format!("Unsupported version: {}", profile.version),
            ));
        }
    }
}

pub(crate) struct WebProtocolRule {
    message: String,
}

impl WebProtocolRule {
    pub(crate) fn new() -> Self {
        WebProtocolRule { message: "url must start with http:// or https://".to_string() }
    }
}

impl Rule for WebProtocolRule {
    fn validate(&self, profile: &Profile, errors: &mut Vec<ValidationError>) {
        let http = predicates::str::starts_with("http://");
        let https = predicates::str::starts_with("https://");
        let base_url = profile.load_test.target.base_url.as_str();
        if !(http.eval(base_url) || https.eval(base_url)) {
            errors.push(error("/load_test/target/base_url", "invalid_value", &self.message));
        }
    }
}

pub(crate) struct ConcurrencyRule {
    message: String,
}

impl ConcurrencyRule {
    pub(crate) fn new() -> Self {
        ConcurrencyRule {
            message: format!("concurrency levels must be a non empty list of values in 1..={MAX_CONCURRENCY}"),
        }
    }
}

impl Rule for ConcurrencyRule {
    fn validate(&self, profile: &Profile, errors: &mut Vec<ValidationError>) {
        let levels = &profile.load_test.concurrency;
        if levels.is_empty() {
            errors.push(error("/load_test/concurrency", "required", &self.message));
        }
        for (i, level) in levels.iter().enumerate() {
            if *level == 0 || *level > MAX_CONCURRENCY {
                errors.push(error(&format!("/load_test/concurrency/{i}"), "out_of_range", &self.message));
            }
        }
    }
}

pub(crate) struct DurationRule {
    message: String,
}

impl DurationRule {
    pub(crate) fn new() -> Self {
        DurationRule { message: format!("duration must be >= 1 and <= {MAX_DURATION_SEC} sec") }
    }
}

impl Rule for DurationRule {
    fn validate(&self, profile: &Profile, errors: &mut Vec<ValidationError>) {
        let duration = profile.load_test.duration_sec;
        if duration == 0 || duration > MAX_DURATION_SEC {
            errors.push(error("/load_test/duration_sec", "out_of_range", &self.message));
        }
    }
}

pub(crate) struct WindowCapacityRule;

impl WindowCapacityRule {
    pub(crate) fn new() -> Self {
        WindowCapacityRule
    }
}

impl Rule for WindowCapacityRule {
    fn validate(&self, profile: &Profile, errors: &mut Vec<ValidationError>) {
        if profile.advisor.window_capacity == 0 {
            errors.push(error("/advisor/window_capacity", "out_of_range", "window capacity must be > 0"));
        }
    }
}

pub(crate) struct ThresholdsRule;

impl ThresholdsRule {
    pub(crate) fn new() -> Self {
        ThresholdsRule
    }
}

impl Rule for ThresholdsRule {
    fn validate(&self, profile: &Profile, errors: &mut Vec<ValidationError>) {
        let policy = &profile.advisor;
        if !(0.0..=100.0).contains(&policy.cpu_threshold_percent) {
            errors.push(error(
                "/advisor/cpu_threshold_percent",
                "out_of_range",
                "cpu threshold must be within 0..=100 percent",
            ));
        }
        if !policy.server_latency_threshold_ms.is_finite() || policy.server_latency_threshold_ms < 0.0 {
            errors.push(error(
                "/advisor/server_latency_threshold_ms",
                "out_of_range",
                "server latency threshold must be a non negative number of ms",
            ));
        }
    }
}

pub(crate) struct TimeoutRule;

impl TimeoutRule {
    pub(crate) fn new() -> Self {
        TimeoutRule
    }
}

impl Rule for TimeoutRule {
    fn validate(&self, profile: &Profile, errors: &mut Vec<ValidationError>) {
        let request_timeout = profile.load_test.target.timeout_ms();
        if request_timeout == 0 {
            errors.push(error("/load_test/target/timeout_ms", "out_of_range", "request timeout must be > 0"));
        }
        // a worker can only be joined after its in-flight request gave up
        if profile.load_test.join_timeout_ms() <= request_timeout {
            errors.push(error(
                "/load_test/join_timeout_ms",
                "out_of_range",
                "join timeout must be greater than the request timeout",
            ));
        }
    }
}

pub(crate) struct InputsRule;

impl InputsRule {
    pub(crate) fn new() -> Self {
        InputsRule
    }
}

impl Rule for InputsRule {
    fn validate(&self, profile: &Profile, errors: &mut Vec<ValidationError>) {
        let inputs = &profile.load_test.inputs;
        if inputs.limit() == Some(0) {
            errors.push(error("/load_test/inputs/limit", "out_of_range", "input limit must be > 0"));
        }
        let location = match inputs {
            InputSource::Images { dir, .. } => dir,
            InputSource::Features { path, .. } => path,
        };
        if location.trim().is_empty() {
            errors.push(error("/load_test/inputs", "required", "input location must not be empty"));
        }
        let compatible = matches!(
            (profile.load_test.mode, inputs),
            (RequestMode::ClassifyOnly, InputSource::Features { .. })
                | (RequestMode::FullRemote | RequestMode::Auto, InputSource::Images { .. })
        );
        if !compatible {
            errors.push(error(
                "/load_test/mode",
                "incompatible",
                &format!("mode {} cannot be fed from this input source", profile.load_test.mode),
            ));
        }
    }
}
