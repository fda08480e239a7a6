use crate::domain::{ConstantKind, Source};
use crate::error::CalibError;

use ConstantKind::*;

/// Static capability record for one supported detector type.
#[derive(Debug, Clone, Copy)]
pub struct DetectorSpec {
    name: &'static str,
    data_type: &'static str,
    calib_type: &'static str,
    kinds: &'static [ConstantKind],
    sources: &'static [&'static str],
}

impl DetectorSpec {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Version-less raw data-type tag, e.g. `CsPad::DataV` matches
    /// `CsPad::DataV2` observed in a run.
    pub fn data_type(&self) -> &'static str {
        self.data_type
    }

    pub fn calib_type(&self) -> &'static str {
        self.calib_type
    }

    pub fn kinds(&self) -> &'static [ConstantKind] {
        self.kinds
    }

    pub fn known_sources(&self) -> &'static [&'static str] {
        self.sources
    }
}

/// Registry of supported detector types keyed by name, replacing per-type
/// branching with table lookup. Immutable after construction.
#[derive(Debug, Clone)]
pub struct DetectorCatalog {
    specs: &'static [DetectorSpec],
}

impl Default for DetectorCatalog {
    fn default() -> Self {
        Self { specs: DETECTORS }
    }
}

impl DetectorCatalog {
    /// Looks a detector type up by name, case-insensitively.
    pub fn get(&self, name: &str) -> Result<&DetectorSpec, CalibError> {
        self.specs
            .iter()
            .find(|spec| spec.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| CalibError::UnknownDetectorType(name.to_string()))
    }

    pub fn detector_names(&self) -> Vec<&'static str> {
        self.specs.iter().map(|spec| spec.name).collect()
    }

    pub fn specs(&self) -> &'static [DetectorSpec] {
        self.specs
    }

    pub fn constant_kinds(&self, name: &str) -> Result<&'static [ConstantKind], CalibError> {
        Ok(self.get(name)?.kinds)
    }

    pub fn calib_type(&self, name: &str) -> Result<&'static str, CalibError> {
        Ok(self.get(name)?.calib_type)
    }

    /// Whether `kind` may be deployed for this detector type. `common_mode`
    /// is gated on an explicit allow-list on top of the per-type kind set.
    pub fn is_applicable(&self, name: &str, kind: ConstantKind) -> Result<bool, CalibError> {
        let spec = self.get(name)?;
        if !spec.kinds.contains(&kind) {
            return Ok(false);
        }
        if kind == ConstantKind::CommonMode {
            return Ok(COMMON_MODE_DEPLOY
                .iter()
                .any(|det| det.eq_ignore_ascii_case(name)));
        }
        Ok(true)
    }

    pub fn sources_of(&self, name: &str) -> Result<Vec<Source>, CalibError> {
        self.get(name)?.sources.iter().map(|src| src.parse()).collect()
    }
}

/// Detector types for which deploying `common_mode` constants is allowed.
const COMMON_MODE_DEPLOY: &[&str] = &["pnCCD"];

const KINDS_CSPAD: &[ConstantKind] = &[
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
    PixelRms,
    PixelMask,
    PixelBkgd,
    Geometry,
];

const KINDS_CSPAD2X2: &[ConstantKind] = &[
    Geometry,
    Center,
    Tilt,
    Pedestals,
    PixelStatus,
    StatusExtra,
    CommonMode,
    Filter,
    PixelGain,
    PixelRms,
    PixelMask,
    PixelBkgd,
];

const KINDS_AREA: &[ConstantKind] = &[
    Pedestals,
    PixelStatus,
    StatusExtra,
    PixelGain,
    PixelRms,
    PixelMask,
    PixelBkgd,
    CommonMode,
    Geometry,
];

const KINDS_EPIX: &[ConstantKind] = &[
    Pedestals,
    PixelStatus,
    StatusExtra,
    PixelGain,
    PixelOffset,
    PixelRms,
    PixelMask,
    PixelBkgd,
    CommonMode,
    Geometry,
];

const KINDS_ACQIRIS: &[ConstantKind] = &[Pedestals, HexConfig, HexTable];

const SRCS_CSPAD: &[&str] = &[
    "CxiDs1.0:Cspad.0",
    "CxiDs2.0:Cspad.0",
    "CxiDsd.0:Cspad.0",
    "MecTargetChamber.0:Cspad.0",
    "XcsEndstation.0:Cspad.0",
    "XppGon.0:Cspad.0",
];

const SRCS_CSPAD2X2: &[&str] = &[
    "CxiDg2.0:Cspad2x2.0",
    "CxiDg2.0:Cspad2x2.1",
    "CxiSc1.0:Cspad2x2.0",
    "CxiSc2.0:Cspad2x2.0",
    "CxiSc2.0:Cspad2x2.1",
    "CxiSc2.0:Cspad2x2.2",
    "CxiSc2.0:Cspad2x2.3",
    "CxiSc2.0:Cspad2x2.4",
    "CxiSc2.0:Cspad2x2.5",
    "CxiSc2.0:Cspad2x2.6",
    "CxiSc2.0:Cspad2x2.7",
    "MecEndstation.0:Cspad2x2.6",
    "MecTargetChamber.0:Cspad2x2.0",
    "MecTargetChamber.0:Cspad2x2.1",
    "MecTargetChamber.0:Cspad2x2.2",
    "MecTargetChamber.0:Cspad2x2.3",
    "MecTargetChamber.0:Cspad2x2.4",
    "MecTargetChamber.0:Cspad2x2.5",
    "SxrBeamline.0:Cspad2x2.2",
    "SxrBeamline.0:Cspad2x2.3",
    "XcsEndstation.0:Cspad2x2.0",
    "XcsEndstation.0:Cspad2x2.1",
    "XppGon.0:Cspad2x2.0",
    "XppGon.0:Cspad2x2.1",
    "XppGon.0:Cspad2x2.2",
    "XppGon.0:Cspad2x2.3",
];

const SRCS_PRINCETON: &[&str] = &[
    "CxiEndstation.0:Princeton.0",
    "MecTargetChamber.0:Princeton.0",
    "MecTargetChamber.0:Princeton.1",
    "MecTargetChamber.0:Princeton.2",
    "MecTargetChamber.0:Princeton.3",
    "MecTargetChamber.0:Princeton.4",
    "MecTargetChamber.0:Princeton.5",
    "SxrEndstation.0:Princeton.0",
    "XcsBeamline.0:Princeton.0",
];

const SRCS_PNCCD: &[&str] = &[
    "Camp.0:pnCCD.0",
    "Camp.0:pnCCD.1",
    "SxrEndstation.0:pnCCD.0",
    "XcsEndstation.0:pnCCD.0",
];

const SRCS_TM6740: &[&str] = &[
    "CxiDg1.0:Tm6740.0",
    "CxiDg2.0:Tm6740.0",
    "CxiDg4.0:Tm6740.0",
    "CxiDsd.0:Tm6740.0",
    "CxiDsu.0:Tm6740.0",
    "CxiKb1.0:Tm6740.0",
    "CxiSc1.0:Tm6740.0",
    "CxiSc2.0:Tm6740.0",
    "CxiSc2.0:Tm6740.1",
    "XcsBeamline.1:Tm6740.4",
    "XcsBeamline.1:Tm6740.5",
    "XppEndstation.1:Tm6740.1",
    "XppMonPim.1:Tm6740.1",
    "XppSb3Pim.1:Tm6740.1",
    "XppSb4Pim.1:Tm6740.1",
];

const SRCS_OPAL1000: &[&str] = &[
    "AmoBPS.0:Opal1000.0",
    "AmoBPS.0:Opal1000.1",
    "AmoEndstation.0:Opal1000.0",
    "AmoEndstation.1:Opal1000.0",
    "AmoEndstation.2:Opal1000.0",
    "AmoVMI.0:Opal1000.0",
    "CxiDg3.0:Opal1000.0",
    "CxiEndstation.0:Opal1000.1",
    "CxiEndstation.0:Opal1000.2",
    "MecTargetChamber.0:Opal1000.1",
    "SxrBeamline.0:Opal1000.0",
    "SxrBeamline.0:Opal1000.1",
    "SxrBeamline.0:Opal1000.100",
    "SxrEndstation.0:Opal1000.0",
    "SxrEndstation.0:Opal1000.1",
    "SxrEndstation.0:Opal1000.2",
    "SxrEndstation.0:Opal1000.3",
    "XcsEndstation.0:Opal1000.0",
    "XcsEndstation.0:Opal1000.1",
    "XcsEndstation.1:Opal1000.1",
    "XcsEndstation.1:Opal1000.2",
    "XppEndstation.0:Opal1000.0",
    "XppEndstation.0:Opal1000.1",
    "XppEndstation.0:Opal1000.2",
];

const SRCS_OPAL2000: &[&str] = &[
    "CxiEndstation.0:Opal2000.1",
    "CxiEndstation.0:Opal2000.2",
    "CxiEndstation.0:Opal2000.3",
    "MecTargetChamber.0:Opal2000.0",
    "MecTargetChamber.0:Opal2000.1",
    "MecTargetChamber.0:Opal2000.2",
];

const SRCS_OPAL4000: &[&str] = &[
    "CxiEndstation.0:Opal4000.1",
    "CxiEndstation.0:Opal4000.3",
    "MecTargetChamber.0:Opal4000.0",
    "MecTargetChamber.0:Opal4000.1",
];

const SRCS_OPAL8000: &[&str] = &[
    "MecTargetChamber.0:Opal8000.0",
    "MecTargetChamber.0:Opal8000.1",
];

const SRCS_ORCAFL40: &[&str] = &[
    "XcsEndstation.0:OrcaFl40.0",
    "XppEndstation.0:OrcaFl40.0",
];

const SRCS_EPIX100A: &[&str] = &[
    "MecTargetChamber.0:Epix100a.0",
    "MfxEndstation.0:Epix100a.0",
    "NoDetector.0:Epix100a.0",
    "NoDetector.0:Epix100a.1",
    "XcsEndstation.0:Epix100a.0",
    "XcsEndstation.0:Epix100a.1",
    "XcsEndstation.0:Epix100a.2",
    "XcsEndstation.0:Epix100a.3",
    "XcsEndstation.0:Epix100a.4",
];

const SRCS_EPIX10KA: &[&str] = &["MfxEndstation.0:Epix10ka.0"];

const SRCS_EPIX10KA2M: &[&str] = &["NoDetector.0:Epix10ka2M.0"];

const SRCS_FCCD960: &[&str] = &["XcsEndstation.0:Fccd960.0"];

const SRCS_RAYONIX: &[&str] = &[
    "CxiEndstation.0:Rayonix.0",
    "MfxEndstation.0:Rayonix.0",
    "XppEndstation.0:Rayonix.0",
    "XppSb1Pim.0:Rayonix.0",
];

const SRCS_ANDOR: &[&str] = &[
    "AmoEndstation.0:Andor.0",
    "MecTargetChamber.0:Andor.1",
    "MecTargetChamber.0:Andor.2",
    "SxrEndstation.0:Andor.0",
    "SxrEndstation.0:Andor.1",
    "SxrEndstation.0:Andor.2",
];

const SRCS_DUALANDOR: &[&str] = &["SxrEndstation.0:DualAndor.0"];

const SRCS_JUNGFRAU: &[&str] = &["CxiEndstation.0:Jungfrau.0"];

const SRCS_ZYLA: &[&str] = &["XppEndstation.0:Zyla.0"];

const SRCS_UXI: &[&str] = &["DetLab.0:Uxi.0"];

const SRCS_PIXIS: &[&str] = &["MecTargetChamber.0:Pixis.1"];

const SRCS_STREAK: &[&str] = &["DetLab.0:StreakC7700.0"];

const SRCS_ARCHON: &[&str] = &["SxrEndstation.0:Archon.0"];

const SRCS_ACQIRIS: &[&str] = &[
    "AmoETOF.0:Acqiris.0",
    "AmoITOF.0:Acqiris.0",
    "Camp.0:Acqiris.0",
    "CxiEndstation.0:Acqiris.0",
    "CxiSc1.0:Acqiris.0",
    "MecTargetChamber.0:Acqiris.0",
    "SxrEndstation.0:Acqiris.0",
    "SxrEndstation.0:Acqiris.1",
    "SxrEndstation.0:Acqiris.2",
    "SxrEndstation.0:Acqiris.3",
    "SxrEndstation.0:Acqiris.4",
    "XcsBeamline.0:Acqiris.0",
    "XppLas.0:Acqiris.0",
];

const SRCS_ISTAR: &[&str] = &[
    "XcsEndstation.0:iStar.0",
    "XppEndstation.0:iStar.0",
    "DetLab.0:iStar.0",
];

const SRCS_ALVIUM: &[&str] = &["MecTargetChamber.0:Alvium.0"];

const DETECTORS: &[DetectorSpec] = &[
    DetectorSpec {
        name: "CSPAD",
        data_type: "CsPad::DataV",
        calib_type: "CsPad::CalibV1",
        kinds: KINDS_CSPAD,
        sources: SRCS_CSPAD,
    },
    DetectorSpec {
        name: "CSPAD2x2",
        data_type: "CsPad2x2::ElementV",
        calib_type: "CsPad2x2::CalibV1",
        kinds: KINDS_CSPAD2X2,
        sources: SRCS_CSPAD2X2,
    },
    DetectorSpec {
        name: "Princeton",
        data_type: "Princeton::FrameV",
        calib_type: "Princeton::CalibV1",
        kinds: KINDS_AREA,
        sources: SRCS_PRINCETON,
    },
    DetectorSpec {
        name: "pnCCD",
        data_type: "PNCCD::FullFrameV",
        calib_type: "PNCCD::CalibV1",
        kinds: KINDS_AREA,
        sources: SRCS_PNCCD,
    },
    DetectorSpec {
        name: "Tm6740",
        data_type: "Camera::FrameV",
        calib_type: "Camera::CalibV1",
        kinds: KINDS_AREA,
        sources: SRCS_TM6740,
    },
    DetectorSpec {
        name: "Opal1000",
        data_type: "Camera::FrameV",
        calib_type: "Camera::CalibV1",
        kinds: KINDS_AREA,
        sources: SRCS_OPAL1000,
    },
    DetectorSpec {
        name: "Opal2000",
        data_type: "Camera::FrameV",
        calib_type: "Camera::CalibV1",
        kinds: KINDS_AREA,
        sources: SRCS_OPAL2000,
    },
    DetectorSpec {
        name: "Opal4000",
        data_type: "Camera::FrameV",
        calib_type: "Camera::CalibV1",
        kinds: KINDS_AREA,
        sources: SRCS_OPAL4000,
    },
    DetectorSpec {
        name: "Opal8000",
        data_type: "Camera::FrameV",
        calib_type: "Camera::CalibV1",
        kinds: KINDS_AREA,
        sources: SRCS_OPAL8000,
    },
    DetectorSpec {
        name: "OrcaFl40",
        data_type: "Camera::FrameV",
        calib_type: "Camera::CalibV1",
        kinds: KINDS_AREA,
        sources: SRCS_ORCAFL40,
    },
    DetectorSpec {
        name: "Epix100a",
        data_type: "Epix::ElementV",
        calib_type: "Epix100a::CalibV1",
        kinds: KINDS_EPIX,
        sources: SRCS_EPIX100A,
    },
    DetectorSpec {
        name: "Epix10ka",
        data_type: "Epix::ElementV",
        calib_type: "Epix10ka::CalibV1",
        kinds: KINDS_EPIX,
        sources: SRCS_EPIX10KA,
    },
    DetectorSpec {
        name: "Epix10ka2M",
        data_type: "Epix::ArrayV",
        calib_type: "Epix10ka2M::CalibV1",
        kinds: KINDS_EPIX,
        sources: SRCS_EPIX10KA2M,
    },
    DetectorSpec {
        name: "Fccd960",
        data_type: "Camera::FrameV",
        calib_type: "Camera::CalibV1",
        kinds: KINDS_AREA,
        sources: SRCS_FCCD960,
    },
    DetectorSpec {
        name: "Rayonix",
        data_type: "Camera::FrameV",
        calib_type: "Camera::CalibV1",
        kinds: KINDS_AREA,
        sources: SRCS_RAYONIX,
    },
    DetectorSpec {
        name: "Andor",
        data_type: "Andor::FrameV",
        calib_type: "Andor::CalibV1",
        kinds: KINDS_AREA,
        sources: SRCS_ANDOR,
    },
    DetectorSpec {
        name: "DualAndor",
        data_type: "Andor3d::FrameV",
        calib_type: "Andor3d::CalibV1",
        kinds: KINDS_AREA,
        sources: SRCS_DUALANDOR,
    },
    DetectorSpec {
        name: "Jungfrau",
        data_type: "Jungfrau::ElementV1",
        calib_type: "Jungfrau::CalibV1",
        kinds: KINDS_EPIX,
        sources: SRCS_JUNGFRAU,
    },
    DetectorSpec {
        name: "Zyla",
        data_type: "Zyla::FrameV",
        calib_type: "Camera::CalibV1",
        kinds: KINDS_AREA,
        sources: SRCS_ZYLA,
    },
    DetectorSpec {
        name: "Uxi",
        data_type: "Uxi::FrameV",
        calib_type: "Uxi::CalibV1",
        kinds: KINDS_AREA,
        sources: SRCS_UXI,
    },
    DetectorSpec {
        name: "Pixis",
        data_type: "Pixis::FrameV",
        calib_type: "Pixis::CalibV1",
        kinds: KINDS_AREA,
        sources: SRCS_PIXIS,
    },
    DetectorSpec {
        name: "StreakC7700",
        data_type: "Camera::FrameV",
        calib_type: "Camera::CalibV1",
        kinds: KINDS_AREA,
        sources: SRCS_STREAK,
    },
    DetectorSpec {
        name: "Archon",
        data_type: "Camera::FrameV",
        calib_type: "Camera::CalibV1",
        kinds: KINDS_AREA,
        sources: SRCS_ARCHON,
    },
    DetectorSpec {
        name: "Acqiris",
        data_type: "Acqiris::DataDesc",
        calib_type: "Acqiris::CalibV1",
        kinds: KINDS_ACQIRIS,
        sources: SRCS_ACQIRIS,
    },
    DetectorSpec {
        name: "iStar",
        data_type: "Zyla::FrameV",
        calib_type: "iStar::CalibV1",
        kinds: KINDS_AREA,
        sources: SRCS_ISTAR,
    },
    DetectorSpec {
        name: "Alvium",
        data_type: "Vimba::FrameV1",
        calib_type: "Alvium::CalibV1",
        kinds: KINDS_AREA,
        sources: SRCS_ALVIUM,
    },
];
