use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CalibError;

/// Instrument source identifier of the form `<Station>.<N>:<DetType>.<M>`,
/// e.g. `CxiDs1.0:Cspad.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source(String);

impl Source {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `<Station>.<N>` half, e.g. `CxiDs1.0`.
    pub fn station(&self) -> &str {
        self.0.split_once(':').map(|(head, _)| head).unwrap_or(&self.0)
    }

    /// The `<DetType>` field, e.g. `Cspad` for `CxiDs1.0:Cspad.0`.
    pub fn detector_token(&self) -> &str {
        let tail = self
            .0
            .split_once(':')
            .map(|(_, tail)| tail)
            .unwrap_or(&self.0);
        tail.rsplit_once('.').map(|(name, _)| name).unwrap_or(tail)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Source {
    type Err = CalibError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let Some((station, detector)) = trimmed.split_once(':') else {
            return Err(CalibError::InvalidSource(value.to_string()));
        };
        if !segment_is_valid(station) || !segment_is_valid(detector) {
            return Err(CalibError::InvalidSource(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

fn segment_is_valid(segment: &str) -> bool {
    match segment.rsplit_once('.') {
        Some((name, index)) => {
            !name.is_empty()
                && name.chars().all(|ch| ch.is_ascii_alphanumeric())
                && !index.is_empty()
                && index.chars().all(|ch| ch.is_ascii_digit())
        }
        None => false,
    }
}

/// Calibration constant kind, named by its on-disk directory tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstantKind {
    Center,
    CenterGlobal,
    Offset,
    OffsetCorr,
    MargGapShift,
    QuadRotation,
    QuadTilt,
    Rotation,
    Tilt,
    Pedestals,
    PixelStatus,
    StatusExtra,
    CommonMode,
    Filter,
    PixelGain,
    PixelOffset,
    PixelRms,
    PixelMask,
    PixelBkgd,
    Geometry,
    HexConfig,
    HexTable,
}

impl ConstantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstantKind::Center => "center",
            ConstantKind::CenterGlobal => "center_global",
            ConstantKind::Offset => "offset",
            ConstantKind::OffsetCorr => "offset_corr",
            ConstantKind::MargGapShift => "marg_gap_shift",
            ConstantKind::QuadRotation => "quad_rotation",
            ConstantKind::QuadTilt => "quad_tilt",
            ConstantKind::Rotation => "rotation",
            ConstantKind::Tilt => "tilt",
            ConstantKind::Pedestals => "pedestals",
            ConstantKind::PixelStatus => "pixel_status",
            ConstantKind::StatusExtra => "status_extra",
            ConstantKind::CommonMode => "common_mode",
            ConstantKind::Filter => "filter",
            ConstantKind::PixelGain => "pixel_gain",
            ConstantKind::PixelOffset => "pixel_offset",
            ConstantKind::PixelRms => "pixel_rms",
            ConstantKind::PixelMask => "pixel_mask",
            ConstantKind::PixelBkgd => "pixel_bkgd",
            ConstantKind::Geometry => "geometry",
            ConstantKind::HexConfig => "hex_config",
            ConstantKind::HexTable => "hex_table",
        }
    }
}

impl fmt::Display for ConstantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConstantKind {
    type Err = CalibError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "center" => Ok(ConstantKind::Center),
            "center_global" => Ok(ConstantKind::CenterGlobal),
            "offset" => Ok(ConstantKind::Offset),
            "offset_corr" => Ok(ConstantKind::OffsetCorr),
            "marg_gap_shift" => Ok(ConstantKind::MargGapShift),
            "quad_rotation" => Ok(ConstantKind::QuadRotation),
            "quad_tilt" => Ok(ConstantKind::QuadTilt),
            "rotation" => Ok(ConstantKind::Rotation),
            "tilt" => Ok(ConstantKind::Tilt),
            "pedestals" => Ok(ConstantKind::Pedestals),
            "pixel_status" => Ok(ConstantKind::PixelStatus),
            "status_extra" => Ok(ConstantKind::StatusExtra),
            "common_mode" => Ok(ConstantKind::CommonMode),
            "filter" => Ok(ConstantKind::Filter),
            "pixel_gain" => Ok(ConstantKind::PixelGain),
            "pixel_offset" => Ok(ConstantKind::PixelOffset),
            "pixel_rms" => Ok(ConstantKind::PixelRms),
            "pixel_mask" => Ok(ConstantKind::PixelMask),
            "pixel_bkgd" => Ok(ConstantKind::PixelBkgd),
            "geometry" => Ok(ConstantKind::Geometry),
            "hex_config" => Ok(ConstantKind::HexConfig),
            "hex_table" => Ok(ConstantKind::HexTable),
            _ => Err(CalibError::InvalidConstantKind(value.to_string())),
        }
    }
}

/// Upper bound of a validity range: a concrete run number or the open-ended
/// `end` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunBound {
    Run(u32),
    End,
}

impl PartialOrd for RunBound {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RunBound {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (RunBound::End, RunBound::End) => Ordering::Equal,
            (RunBound::End, RunBound::Run(_)) => Ordering::Greater,
            (RunBound::Run(_), RunBound::End) => Ordering::Less,
            (RunBound::Run(a), RunBound::Run(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for RunBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunBound::Run(run) => write!(f, "{run}"),
            RunBound::End => write!(f, "end"),
        }
    }
}

impl FromStr for RunBound {
    type Err = CalibError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value == "end" {
            return Ok(RunBound::End);
        }
        value
            .parse::<u32>()
            .map(RunBound::Run)
            .map_err(|_| CalibError::InvalidRunRange(value.to_string()))
    }
}

/// Inclusive run interval a calibration artifact is valid for. Renders as
/// `<from>-<to>` with no leading zeros, `to` may be the literal `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityRange {
    from: u32,
    to: RunBound,
}

impl ValidityRange {
    pub fn new(from: u32, to: RunBound) -> Result<Self, CalibError> {
        if let RunBound::Run(to_run) = to
            && to_run < from
        {
            return Err(CalibError::InvalidRunRange(format!("{from}-{to_run}")));
        }
        Ok(Self { from, to })
    }

    /// `<run>-end`, the default range for a deploy of a single dark run.
    pub fn open_from(run: u32) -> Self {
        Self {
            from: run,
            to: RunBound::End,
        }
    }

    pub fn from_run(&self) -> u32 {
        self.from
    }

    pub fn to_run(&self) -> RunBound {
        self.to
    }

    pub fn contains(&self, run: u32) -> bool {
        run >= self.from && RunBound::Run(run) <= self.to
    }
}

impl fmt::Display for ValidityRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

impl FromStr for ValidityRange {
    type Err = CalibError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let Some((from, to)) = trimmed.split_once('-') else {
            return Err(CalibError::InvalidRunRange(value.to_string()));
        };
        let from = from
            .parse::<u32>()
            .map_err(|_| CalibError::InvalidRunRange(value.to_string()))?;
        let to = to.parse::<RunBound>()?;
        Self::new(from, to)
    }
}

/// Lowercase experiment name, e.g. `cxib2313`. The first three characters
/// name the instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExperimentName(String);

impl ExperimentName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Instrument short name, e.g. `CXI` for `cxib2313`.
    pub fn instrument(&self) -> String {
        self.0.chars().take(3).collect::<String>().to_uppercase()
    }
}

impl fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExperimentName {
    type Err = CalibError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        let is_valid = normalized.len() >= 4
            && normalized.chars().all(|ch| ch.is_ascii_alphanumeric())
            && normalized
                .chars()
                .take(3)
                .all(|ch| ch.is_ascii_alphabetic());
        if !is_valid {
            return Err(CalibError::InvalidExperimentName(value.to_string()));
        }
        Ok(Self(normalized))
    }
}
