use crate::models::{ExerciseType, Stage};

/// Coarse location within the range of motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Rest,
    Travel,
    Peak,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleBand {
    pub lower: f64,
    pub label: &'static str,
    pub position: Position,
    /// Warning text when the band is unsafe.
    pub danger: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageSpec {
    pub stage: Stage,
    pub position: Position,
}

/// Band lower edges are inclusive. The first band starts at negative
/// infinity, so out-of-range values land in the outermost band.
#[derive(Debug)]
pub struct ExerciseProfile {
    pub exercise: ExerciseType,
    pub bands: &'static [AngleBand],
    pub cycle: &'static [StageSpec],
    /// Index into `bands` used for NaN readings.
    pub resting_band: usize,
    pub imbalance_threshold: Option<f64>,
}

const fn band(
    lower: f64,
    label: &'static str,
    position: Position,
    danger: Option<&'static str>,
) -> AngleBand {
    AngleBand {
        lower,
        label,
        position,
        danger,
    }
}

const fn step(stage: Stage, position: Position) -> StageSpec {
    StageSpec { stage, position }
}

const SQUAT_BANDS: [AngleBand; 7] = [
    band(
        f64::NEG_INFINITY,
        "too deep",
        Position::Peak,
        Some("Too deep, protect your knees"),
    ),
    band(70.0, "deep transition", Position::Peak, None),
    band(85.0, "perfect depth", Position::Peak, None),
    band(95.0, "mid-range", Position::Travel, None),
    band(150.0, "near top", Position::Rest, None),
    band(170.0, "standing", Position::Rest, None),
    band(
        185.0,
        "hyperextended",
        Position::Rest,
        Some("Knees locked, keep a soft bend"),
    ),
];

const PUSH_UP_BANDS: [AngleBand; 5] = [
    band(
        f64::NEG_INFINITY,
        "chest collapsed",
        Position::Peak,
        Some("Too low, keep your chest off the floor"),
    ),
    band(70.0, "good depth", Position::Peak, None),
    band(90.0, "mid-range", Position::Travel, None),
    band(160.0, "top position", Position::Rest, None),
    band(
        185.0,
        "hyperextended",
        Position::Rest,
        Some("Elbows locked, keep a soft bend"),
    ),
];

const HAMMER_CURL_BANDS: [AngleBand; 4] = [
    band(f64::NEG_INFINITY, "full curl", Position::Peak, None),
    band(47.0, "mid-range", Position::Travel, None),
    band(155.0, "extended", Position::Rest, None),
    band(
        175.0,
        "locked out",
        Position::Rest,
        Some("Elbow locked out, keep tension at the bottom"),
    ),
];

const DESCEND_AND_RISE: [StageSpec; 4] = [
    step(Stage::Starting, Position::Rest),
    step(Stage::Descent, Position::Travel),
    step(Stage::Bottom, Position::Peak),
    step(Stage::Ascent, Position::Travel),
];

const CURL_CYCLE: [StageSpec; 4] = [
    step(Stage::Extended, Position::Rest),
    step(Stage::Curling, Position::Travel),
    step(Stage::Peak, Position::Peak),
    step(Stage::Lowering, Position::Travel),
];

pub const DEFAULT_IMBALANCE_DEGREES: f64 = 20.0;

static SQUAT: ExerciseProfile = ExerciseProfile {
    exercise: ExerciseType::Squat,
    bands: &SQUAT_BANDS,
    cycle: &DESCEND_AND_RISE,
    resting_band: 5,
    imbalance_threshold: None,
};

static PUSH_UP: ExerciseProfile = ExerciseProfile {
    exercise: ExerciseType::PushUp,
    bands: &PUSH_UP_BANDS,
    cycle: &DESCEND_AND_RISE,
    resting_band: 3,
    imbalance_threshold: None,
};

static HAMMER_CURL: ExerciseProfile = ExerciseProfile {
    exercise: ExerciseType::HammerCurl,
    bands: &HAMMER_CURL_BANDS,
    cycle: &CURL_CYCLE,
    resting_band: 2,
    imbalance_threshold: Some(DEFAULT_IMBALANCE_DEGREES),
};

impl ExerciseProfile {
    pub fn for_exercise(exercise: ExerciseType) -> &'static ExerciseProfile {
        match exercise {
            ExerciseType::Squat => &SQUAT,
            ExerciseType::PushUp => &PUSH_UP,
            ExerciseType::HammerCurl => &HAMMER_CURL,
        }
    }

    pub fn zone(&self, angle: f64) -> &AngleBand {
        if angle.is_nan() {
            return &self.bands[self.resting_band];
        }
        self.bands
            .iter()
            .rev()
            .find(|band| angle >= band.lower)
            .unwrap_or(&self.bands[0])
    }

    /// Angle gap between arms when it exceeds the threshold.
    pub fn imbalance(&self, right: f64, left: f64) -> Option<f64> {
        let threshold = self.imbalance_threshold?;
        let gap = (right - left).abs();
        (gap > threshold).then_some(gap)
    }
}

/// Zone label and danger flag for a single angle.
pub fn interpret(exercise: ExerciseType, angle: f64) -> (&'static str, bool) {
    let zone = ExerciseProfile::for_exercise(exercise).zone(angle);
    (zone.label, zone.danger.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_contiguous(profile: &ExerciseProfile) {
        assert_eq!(profile.bands[0].lower, f64::NEG_INFINITY);
        for pair in profile.bands.windows(2) {
            assert!(pair[0].lower < pair[1].lower, "{:?} bands out of order", profile.exercise);
        }
        assert!(profile.resting_band < profile.bands.len());
        assert!(profile.bands[profile.resting_band].danger.is_none());
    }

    #[test]
    fn band_tables_are_ordered_and_cover_the_line() {
        for exercise in [ExerciseType::Squat, ExerciseType::PushUp, ExerciseType::HammerCurl] {
            assert_contiguous(ExerciseProfile::for_exercise(exercise));
        }
    }

    #[test]
    fn squat_bands_follow_documented_cut_points() {
        assert_eq!(interpret(ExerciseType::Squat, 60.0), ("too deep", true));
        assert_eq!(interpret(ExerciseType::Squat, 70.0), ("deep transition", false));
        assert_eq!(interpret(ExerciseType::Squat, 85.0), ("perfect depth", false));
        assert_eq!(interpret(ExerciseType::Squat, 94.9), ("perfect depth", false));
        assert_eq!(interpret(ExerciseType::Squat, 95.0), ("mid-range", false));
        assert_eq!(interpret(ExerciseType::Squat, 150.0), ("near top", false));
        assert_eq!(interpret(ExerciseType::Squat, 170.0), ("standing", false));
        assert_eq!(interpret(ExerciseType::Squat, 185.0), ("hyperextended", true));
    }

    #[test]
    fn out_of_range_values_clamp_to_outer_bands() {
        assert_eq!(interpret(ExerciseType::Squat, -400.0), ("too deep", true));
        assert_eq!(interpret(ExerciseType::Squat, f64::INFINITY), ("hyperextended", true));
        assert_eq!(interpret(ExerciseType::PushUp, 1e9), ("hyperextended", true));
        assert_eq!(interpret(ExerciseType::HammerCurl, f64::NEG_INFINITY), ("full curl", false));
    }

    #[test]
    fn nan_reads_as_resting_zone() {
        assert_eq!(interpret(ExerciseType::Squat, f64::NAN), ("standing", false));
        assert_eq!(interpret(ExerciseType::HammerCurl, f64::NAN), ("extended", false));
    }

    #[test]
    fn imbalance_requires_strictly_more_than_threshold() {
        let curl = ExerciseProfile::for_exercise(ExerciseType::HammerCurl);
        assert_eq!(curl.imbalance(90.0, 60.0), Some(30.0));
        assert_eq!(curl.imbalance(90.0, 75.0), None);
        assert_eq!(curl.imbalance(90.0, 70.0), None);
        assert_eq!(curl.imbalance(60.0, 90.0), Some(30.0));
    }

    #[test]
    fn single_limb_profiles_never_flag_imbalance() {
        let squat = ExerciseProfile::for_exercise(ExerciseType::Squat);
        assert_eq!(squat.imbalance(170.0, 60.0), None);
    }
}
