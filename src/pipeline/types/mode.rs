use std::fmt;
use std::str::FromStr;

/// Which detector handles a request. Anything unrecognised passes the image
/// through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Color,
    Bright,
    Shape,
    Sharp,
    Passthrough,
}

impl Mode {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "color" => Mode::Color,
            "bright" => Mode::Bright,
            "shape" => Mode::Shape,
            "sharp" => Mode::Sharp,
            _ => Mode::Passthrough,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Color => "color",
            Mode::Bright => "bright",
            Mode::Shape => "shape",
            Mode::Sharp => "sharp",
            Mode::Passthrough => "passthrough",
        }
    }
}

impl FromStr for Mode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Mode::parse(s))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes_are_case_insensitive() {
        assert_eq!(Mode::parse("COLOR"), Mode::Color);
        assert_eq!(Mode::parse("Bright"), Mode::Bright);
        assert_eq!(Mode::parse("ShApE"), Mode::Shape);
        assert_eq!("sHaRp".parse::<Mode>().unwrap(), Mode::Sharp);
    }

    #[test]
    fn test_unknown_modes_pass_through() {
        assert_eq!(Mode::parse(""), Mode::Passthrough);
        assert_eq!(Mode::parse("colour"), Mode::Passthrough);
        assert_eq!(Mode::parse("passthrough"), Mode::Passthrough);
        assert_eq!(Mode::parse(" color"), Mode::Passthrough);
    }
}
