//! Parameter entry for a contingency-table query.
//!
//! The form validates the minimum-frequency input, encodes the context-window
//! position of each attribute and refuses structure combinations the backend
//! cannot cross-tabulate. A successful [`CtFormModel::submit`] yields the
//! [`CtQuery`] used for the initial fetch or a resubmission.

use serde::{Deserialize, Serialize};

use freqct_stats::AlphaLevel;

use crate::config::FreqctConfig;
use crate::error::CtableError;
use crate::model::{CtQuery, MinFreqFilter, MinFreqType, is_struct_attr};
use crate::params::CtParams;

// ---------------------------------------------------------------------------
// Context positions
// ---------------------------------------------------------------------------

/// Offsets −6..=+6 anchored on the left edge of the KWIC.
const LEFT_POSITIONS: [&str; 13] = [
    "-6<0", "-5<0", "-4<0", "-3<0", "-2<0", "-1<0", "0<0", "1<0", "2<0", "3<0", "4<0", "5<0",
    "6<0",
];

/// Offsets −6..=+6 anchored on the right edge of the KWIC.
const RIGHT_POSITIONS: [&str; 13] = [
    "-6>0", "-5>0", "-4>0", "-3>0", "-2>0", "-1>0", "0>0", "1>0", "2>0", "3>0", "4>0", "5>0",
    "6>0",
];

/// Index of offset 0 in the position tables.
pub const KWIC_INDEX: usize = 6;

/// Which KWIC edge an offset is counted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Right,
}

impl std::str::FromStr for Alignment {
    type Err = CtableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            _ => Err(CtableError::UnknownValue {
                kind: "alignment",
                value: s.to_string(),
            }),
        }
    }
}

/// Encode a table index (0..13) and alignment as a position criterion.
pub fn encode_position(index: usize, align: Alignment) -> Result<&'static str, CtableError> {
    let table = match align {
        Alignment::Left => &LEFT_POSITIONS,
        Alignment::Right => &RIGHT_POSITIONS,
    };
    table
        .get(index)
        .copied()
        .ok_or_else(|| CtableError::InvalidPosition(format!("index {index}")))
}

/// A decoded position criterion such as `-3<0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub offset: i8,
    pub align: Alignment,
}

impl Position {
    /// The KWIC itself.
    pub const KWIC: Position = Position {
        offset: 0,
        align: Alignment::Left,
    };

    /// Position at `index` of the 13-entry table for `align`.
    pub fn from_index(index: usize, align: Alignment) -> Result<Self, CtableError> {
        encode_position(index, align)?.parse()
    }

    /// Index into the 13-entry tables.
    pub fn index(&self) -> usize {
        (self.offset as i32 + KWIC_INDEX as i32) as usize
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let edge = match self.align {
            Alignment::Left => '<',
            Alignment::Right => '>',
        };
        write!(f, "{}{edge}0", self.offset)
    }
}

impl std::str::FromStr for Position {
    type Err = CtableError;

    /// Accepts exactly the strings produced by [`encode_position`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CtableError::InvalidPosition(s.to_string());
        let (offset, align) = if let Some(offset) = s.strip_suffix("<0") {
            (offset, Alignment::Left)
        } else if let Some(offset) = s.strip_suffix(">0") {
            (offset, Alignment::Right)
        } else {
            return Err(invalid());
        };
        let offset: i8 = offset.parse().map_err(|_| invalid())?;
        if !(-6..=6).contains(&offset) {
            return Err(invalid());
        }
        Ok(Self { offset, align })
    }
}

/// Parse a position criterion into offset and alignment.
pub fn decode_position(ctfcrit: &str) -> Result<Position, CtableError> {
    ctfcrit.parse()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a minimum-frequency input for the given filter kind.
///
/// Absolute and ipm kinds take a non-negative integer; percentile kinds take
/// a number in `(0, 100]`.
pub fn validate_min_freq(input: &str, kind: MinFreqType) -> Result<f64, CtableError> {
    let input = input.trim();
    if kind.is_percentile() {
        let value: f64 = input
            .parse()
            .map_err(|_| CtableError::PercentileOutOfRange(input.to_string()))?;
        if value.is_finite() && value > 0.0 && value <= 100.0 {
            Ok(value)
        } else {
            Err(CtableError::PercentileOutOfRange(input.to_string()))
        }
    } else {
        input
            .parse::<u64>()
            .map(|v| v as f64)
            .map_err(|_| CtableError::InvalidMinFreq(input.to_string()))
    }
}

/// Enclosing structure of a structural attribute (`doc.genre` → `doc`).
pub fn struct_of(attr: &str) -> Option<&str> {
    attr.split_once('.').map(|(s, _)| s)
}

/// Two structural attributes are allowed only if both of their structures
/// are listed in `allowed`.
pub fn validate_struct_attrs(
    attr1: &str,
    attr2: &str,
    allowed: &[String],
) -> Result<(), CtableError> {
    let (Some(s1), Some(s2)) = (struct_of(attr1), struct_of(attr2)) else {
        return Ok(());
    };
    let listed = |s: &str| allowed.iter().any(|a| a == s);
    if listed(s1) && listed(s2) {
        Ok(())
    } else {
        Err(CtableError::StructsNotAllowed {
            first: s1.to_string(),
            second: s2.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Form model
// ---------------------------------------------------------------------------

/// User-entered parameters of a contingency-table query.
#[derive(Debug, Clone, PartialEq)]
pub struct CtFormModel {
    pub attr1: String,
    pub attr2: String,
    /// Index into the position tables (6 = KWIC).
    pub pos1: usize,
    pub align1: Alignment,
    pub pos2: usize,
    pub align2: Alignment,
    pub min_freq_input: String,
    pub min_freq_type: MinFreqType,
    pub alpha_level: AlphaLevel,
    pub multi_sattr_allowed_structs: Vec<String>,
}

impl CtFormModel {
    pub fn new(attr1: impl Into<String>, attr2: impl Into<String>) -> Self {
        Self {
            attr1: attr1.into(),
            attr2: attr2.into(),
            pos1: KWIC_INDEX,
            align1: Alignment::Left,
            pos2: KWIC_INDEX,
            align2: Alignment::Left,
            min_freq_input: "1".to_string(),
            min_freq_type: MinFreqType::Abs,
            alpha_level: AlphaLevel::default(),
            multi_sattr_allowed_structs: Vec::new(),
        }
    }

    /// Form prefilled with the configured alpha level and structure allow-list.
    pub fn with_config(
        attr1: impl Into<String>,
        attr2: impl Into<String>,
        config: &FreqctConfig,
    ) -> Self {
        Self {
            alpha_level: config.alpha_level,
            multi_sattr_allowed_structs: config.multi_sattr_allowed_structs.clone(),
            ..Self::new(attr1, attr2)
        }
    }

    /// Position criterion of the first attribute; structural attributes are
    /// always anchored on the KWIC.
    pub fn ctfcrit1(&self) -> Result<Position, CtableError> {
        position_for(&self.attr1, self.pos1, self.align1)
    }

    pub fn ctfcrit2(&self) -> Result<Position, CtableError> {
        position_for(&self.attr2, self.pos2, self.align2)
    }

    /// Validated minimum-frequency filter.
    pub fn min_freq(&self) -> Result<MinFreqFilter, CtableError> {
        if self.min_freq_type.quantity() == crate::model::Quantity::Ipm
            && is_struct_attr(&self.attr1)
            && is_struct_attr(&self.attr2)
        {
            return Err(CtableError::IpmUnavailable);
        }
        let threshold = validate_min_freq(&self.min_freq_input, self.min_freq_type)?;
        Ok(MinFreqFilter::new(self.min_freq_type, threshold))
    }

    /// Run every check without building anything.
    pub fn validate(&self) -> Result<(), CtableError> {
        validate_struct_attrs(&self.attr1, &self.attr2, &self.multi_sattr_allowed_structs)?;
        self.ctfcrit1()?;
        self.ctfcrit2()?;
        self.min_freq()?;
        Ok(())
    }

    /// Validated query for an initial submission or a resubmission.
    pub fn submit(&self) -> Result<CtQuery, CtableError> {
        Ok(self.to_params(&FreqctConfig::default())?.to_query())
    }

    /// Table parameters for a validated form.
    pub fn to_params(&self, config: &FreqctConfig) -> Result<CtParams, CtableError> {
        self.validate()?;
        let mut params = CtParams::new(self.attr1.clone(), self.attr2.clone());
        params.ctfcrit1 = self.ctfcrit1()?;
        params.ctfcrit2 = self.ctfcrit2()?;
        params.min_freq = self.min_freq()?;
        params.server_min_freq = params.min_freq;
        params.alpha_level = self.alpha_level;
        params.conc_args = config.conc_args.clone();
        params.quick_filter_action = config.quick_filter_action.clone();
        Ok(params)
    }
}

fn position_for(attr: &str, index: usize, align: Alignment) -> Result<Position, CtableError> {
    if is_struct_attr(attr) {
        Ok(Position::KWIC)
    } else {
        Position::from_index(index, align)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_position_tables() {
        assert_eq!(encode_position(3, Alignment::Left).unwrap(), "-3<0");
        assert_eq!(encode_position(8, Alignment::Right).unwrap(), "2>0");
        assert_eq!(encode_position(KWIC_INDEX, Alignment::Left).unwrap(), "0<0");
        assert!(encode_position(13, Alignment::Left).is_err());
    }

    #[test]
    fn test_position_display_matches_tables() {
        for index in 0..13 {
            for align in [Alignment::Left, Alignment::Right] {
                let pos = Position::from_index(index, align).unwrap();
                assert_eq!(pos.to_string(), encode_position(index, align).unwrap());
                assert_eq!(pos.index(), index);
            }
        }
    }

    #[test]
    fn test_decode_position() {
        let pos = decode_position("-3<0").unwrap();
        assert_eq!(pos.offset, -3);
        assert_eq!(pos.align, Alignment::Left);
        assert!(decode_position("7<0").is_err());
        assert!(decode_position("1=0").is_err());
        assert!(decode_position("").is_err());
    }

    #[test]
    fn test_validate_min_freq_absolute() {
        assert_eq!(validate_min_freq("0", MinFreqType::Abs).unwrap(), 0.0);
        assert_eq!(validate_min_freq(" 12 ", MinFreqType::Ipm).unwrap(), 12.0);
        assert!(matches!(
            validate_min_freq("-1", MinFreqType::Abs),
            Err(CtableError::InvalidMinFreq(_))
        ));
        assert!(validate_min_freq("1.5", MinFreqType::Abs).is_err());
        assert!(validate_min_freq("abc", MinFreqType::Abs).is_err());
    }

    #[test]
    fn test_validate_min_freq_percentile() {
        assert_eq!(
            validate_min_freq("100", MinFreqType::PercentileAbs).unwrap(),
            100.0
        );
        assert_eq!(
            validate_min_freq("0.5", MinFreqType::PercentileIpm).unwrap(),
            0.5
        );
        assert!(matches!(
            validate_min_freq("0", MinFreqType::PercentileAbs),
            Err(CtableError::PercentileOutOfRange(_))
        ));
        assert!(validate_min_freq("100.1", MinFreqType::PercentileAbs).is_err());
        assert!(validate_min_freq("NaN", MinFreqType::PercentileAbs).is_err());
    }

    #[test]
    fn test_struct_allow_list() {
        let allowed = vec!["doc".to_string(), "text".to_string()];
        assert!(validate_struct_attrs("doc.genre", "text.year", &allowed).is_ok());
        assert!(validate_struct_attrs("doc.genre", "p.type", &allowed).is_err());
        assert!(validate_struct_attrs("word", "p.type", &[]).is_ok());
    }

    #[test]
    fn test_submit_builds_query() {
        let mut form = CtFormModel::new("word", "tag");
        form.pos2 = 7;
        form.min_freq_input = "5".into();
        let q = form.submit().unwrap();
        assert_eq!(q.ctattr1, "word");
        assert_eq!(q.ctfcrit1, "0<0");
        assert_eq!(q.ctfcrit2, "1<0");
        assert_eq!(q.ctminfreq, "5");
        assert_eq!(q.ctminfreq_type, MinFreqType::Abs);
    }

    #[test]
    fn test_structural_attr_anchored_on_kwic() {
        let mut form = CtFormModel::new("doc.genre", "word");
        form.pos1 = 0;
        assert_eq!(form.ctfcrit1().unwrap(), Position::KWIC);
    }

    #[test]
    fn test_submit_rejects_invalid_input() {
        let mut form = CtFormModel::new("word", "tag");
        form.min_freq_input = "x".into();
        assert!(form.submit().unwrap_err().is_validation());

        let mut form = CtFormModel::new("doc.genre", "text.year");
        assert!(matches!(
            form.submit(),
            Err(CtableError::StructsNotAllowed { .. })
        ));
        form.multi_sattr_allowed_structs = vec!["doc".into(), "text".into()];
        form.min_freq_type = MinFreqType::Ipm;
        assert!(matches!(form.submit(), Err(CtableError::IpmUnavailable)));
        form.min_freq_type = MinFreqType::Abs;
        assert!(form.submit().is_ok());
    }
}
