use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::angles::{ExerciseProfile, Position, StageSpec};
use crate::models::{
    AngleSample, ExerciseType, Progress, Reading, SessionGoal, StageState, StageTransition,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Complete,
}

#[derive(Debug, Clone, Copy, Default)]
struct LimbTracker {
    stage_index: usize,
    laps: u32,
}

impl LimbTracker {
    /// Moves along the cycle; returns true when a full lap closes.
    fn step(&mut self, cycle: &[StageSpec], position: Position) -> bool {
        let next = (self.stage_index + 1) % cycle.len();
        if cycle[next].position == position {
            self.stage_index = next;
            if next == 0 {
                self.laps += 1;
                return true;
            }
            return false;
        }

        // One stage back is an oscillation, not a new lap.
        if self.stage_index > 0
            && cycle[self.stage_index].position != position
            && cycle[self.stage_index - 1].position == position
        {
            self.stage_index -= 1;
        }
        false
    }
}

#[derive(Debug)]
pub struct ExerciseStateMachine {
    profile: &'static ExerciseProfile,
    goal: SessionGoal,
    limbs: Vec<LimbTracker>,
    /// Laps already turned into reps; laps are never reset, so a lagging arm
    /// finishing the same curl after a set rollover adds nothing.
    credited_laps: u32,
    current_rep: u32,
    current_set: u32,
    warning_count: u32,
    warnings_by_category: BTreeMap<String, u32>,
    status: SessionStatus,
}

impl ExerciseStateMachine {
    pub fn new(exercise: ExerciseType, goal: SessionGoal) -> Self {
        let limb_count = if exercise.is_two_limb() { 2 } else { 1 };
        Self {
            profile: ExerciseProfile::for_exercise(exercise),
            goal,
            limbs: vec![LimbTracker::default(); limb_count],
            credited_laps: 0,
            current_rep: 0,
            current_set: 0,
            warning_count: 0,
            warnings_by_category: BTreeMap::new(),
            status: SessionStatus::Active,
        }
    }

    pub fn exercise(&self) -> ExerciseType {
        self.profile.exercise
    }

    pub fn goal(&self) -> SessionGoal {
        self.goal
    }

    pub fn current_rep(&self) -> u32 {
        self.current_rep
    }

    pub fn current_set(&self) -> u32 {
        self.current_set
    }

    pub fn warning_count(&self) -> u32 {
        self.warning_count
    }

    pub fn warnings_by_category(&self) -> &BTreeMap<String, u32> {
        &self.warnings_by_category
    }

    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Complete
    }

    /// Reps across finished sets plus the set in progress.
    pub fn total_reps(&self) -> u32 {
        self.current_set * self.goal.reps + self.current_rep
    }

    /// Finished sets plus the set in progress when it has any reps.
    pub fn sets_with_work(&self) -> u32 {
        self.current_set + u32::from(self.current_rep > 0)
    }

    pub fn stage(&self) -> StageState {
        let cycle = self.profile.cycle;
        match self.limbs.as_slice() {
            [right, left] => StageState::Pair {
                right: cycle[right.stage_index].stage,
                left: cycle[left.stage_index].stage,
            },
            limbs => StageState::Single(cycle[limbs[0].stage_index].stage),
        }
    }

    pub fn progress(&self) -> Progress {
        Progress {
            exercise: self.profile.exercise,
            current_rep: self.current_rep,
            current_set: self.current_set,
            goal: self.goal,
            warning_count: self.warning_count,
        }
    }

    fn limb_angles(&self, reading: Reading) -> Vec<f64> {
        match (reading, self.limbs.len()) {
            (Reading::Single(angle), 2) => vec![angle, angle],
            (Reading::Single(angle), _) => vec![angle],
            (Reading::Pair { right, left }, 2) => vec![right, left],
            (Reading::Pair { right, .. }, _) => vec![right],
        }
    }

    fn reps_from_limbs(&self) -> u32 {
        self.limbs.iter().map(|limb| limb.laps).max().unwrap_or(0)
    }

    /// Applies one sample. Returns `None` once the session is complete.
    pub fn process(&mut self, sample: &AngleSample) -> Option<StageTransition> {
        if self.is_complete() {
            return None;
        }

        let profile = self.profile;
        let from_stage = self.stage();
        let angles = self.limb_angles(sample.reading);
        let two_limbs = angles.len() == 2;

        let mut warnings: Vec<String> = Vec::new();
        let mut categories: Vec<&'static str> = Vec::new();

        for (index, (limb, angle)) in self.limbs.iter_mut().zip(&angles).enumerate() {
            let zone = profile.zone(*angle);
            if let Some(text) = zone.danger {
                categories.push(zone.label);
                if two_limbs {
                    let side = if index == 0 { "Right" } else { "Left" };
                    warnings.push(format!("{side} arm: {text}"));
                } else {
                    warnings.push(text.to_string());
                }
            }
            limb.step(profile.cycle, zone.position);
        }

        if let Reading::Pair { right, left } = sample.reading {
            if let Some(gap) = profile.imbalance(right, left) {
                categories.push("imbalance");
                warnings.push(format!("Arms out of sync, {gap:.0}° difference"));
            }
        }

        let warning = if warnings.is_empty() {
            None
        } else {
            self.warning_count += 1;
            for category in categories {
                *self
                    .warnings_by_category
                    .entry(category.to_string())
                    .or_insert(0) += 1;
            }
            Some(warnings.join("; "))
        };

        let laps = self.reps_from_limbs();
        let rep_completed = laps > self.credited_laps;
        let mut rep_number = None;
        let mut set_completed = false;
        let mut session_completed = false;

        if rep_completed {
            self.credited_laps = laps;
            self.current_rep += 1;
            rep_number = Some(self.current_rep);
            debug!(
                exercise = %profile.exercise,
                rep = self.current_rep,
                set = self.current_set + 1,
                "rep completed"
            );

            if self.current_rep >= self.goal.reps {
                self.current_rep = 0;
                self.current_set += 1;
                set_completed = true;
                info!(
                    exercise = %profile.exercise,
                    set = self.current_set,
                    goal_sets = self.goal.sets,
                    "set completed"
                );

                if self.current_set >= self.goal.sets {
                    self.status = SessionStatus::Complete;
                    session_completed = true;
                    info!(exercise = %profile.exercise, "workout goal reached");
                }
            }
        }

        let to_stage = self.stage();
        Some(StageTransition {
            from_stage,
            to_stage,
            stage_changed: from_stage != to_stage,
            rep_completed,
            rep_number,
            set_completed,
            session_completed,
            warning,
            reading: sample.reading,
            timestamp: sample.timestamp,
            progress: self.progress(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::Stage;

    fn feed(machine: &mut ExerciseStateMachine, angles: &[f64]) -> Vec<StageTransition> {
        angles
            .iter()
            .enumerate()
            .filter_map(|(i, angle)| {
                machine.process(&AngleSample::single(*angle, Duration::from_millis(i as u64 * 100)))
            })
            .collect()
    }

    fn squat(reps: u32, sets: u32) -> ExerciseStateMachine {
        ExerciseStateMachine::new(ExerciseType::Squat, SessionGoal::new(reps, sets).unwrap())
    }

    #[test]
    fn squat_walkthrough_counts_two_reps_and_completes() {
        let mut machine = squat(2, 1);
        let events = feed(
            &mut machine,
            &[170.0, 120.0, 80.0, 120.0, 170.0, 120.0, 80.0, 120.0, 170.0],
        );

        let stages: Vec<StageState> = events.iter().map(|e| e.to_stage).collect();
        assert_eq!(stages[1], StageState::Single(Stage::Descent));
        assert_eq!(stages[2], StageState::Single(Stage::Bottom));
        assert_eq!(stages[3], StageState::Single(Stage::Ascent));
        assert_eq!(stages[4], StageState::Single(Stage::Starting));

        let reps: Vec<u32> = events.iter().filter_map(|e| e.rep_number).collect();
        assert_eq!(reps, vec![1, 2]);

        let last = events.last().unwrap();
        assert!(last.set_completed);
        assert!(last.session_completed);
        assert_eq!(last.progress.current_rep, 0);
        assert_eq!(last.progress.current_set, 1);
        assert!(machine.is_complete());
    }

    #[test]
    fn one_full_cycle_adds_exactly_one_rep() {
        let mut machine = squat(5, 1);
        let events = feed(&mut machine, &[170.0, 120.0, 80.0, 120.0, 170.0, 170.0, 175.0]);
        assert_eq!(events.iter().filter(|e| e.rep_completed).count(), 1);
        assert_eq!(machine.current_rep(), 1);
    }

    #[test]
    fn oscillation_without_full_lap_does_not_count() {
        let mut machine = squat(5, 1);
        feed(&mut machine, &[170.0, 120.0, 170.0, 120.0, 80.0, 120.0, 80.0, 120.0]);
        assert_eq!(machine.current_rep(), 0);
        assert_eq!(machine.stage(), StageState::Single(Stage::Ascent));

        feed(&mut machine, &[170.0]);
        assert_eq!(machine.current_rep(), 1);
    }

    #[test]
    fn partial_lap_back_to_start_is_a_no_op() {
        let mut machine = squat(5, 1);
        let events = feed(&mut machine, &[170.0, 120.0, 170.0]);
        assert_eq!(events[2].to_stage, StageState::Single(Stage::Starting));
        assert!(events.iter().all(|e| !e.rep_completed && e.warning.is_none()));
        assert_eq!(machine.warning_count(), 0);
    }

    #[test]
    fn noise_keeps_stage_but_still_warns() {
        let mut machine = squat(5, 1);
        let events = feed(&mut machine, &[170.0, 60.0]);
        assert_eq!(events[1].to_stage, StageState::Single(Stage::Starting));
        assert!(!events[1].stage_changed);
        assert_eq!(events[1].warning.as_deref(), Some("Too deep, protect your knees"));
        assert_eq!(machine.warning_count(), 1);
    }

    #[test]
    fn warnings_count_once_per_sample_and_do_not_block_reps() {
        let mut machine = squat(5, 1);
        feed(&mut machine, &[170.0, 120.0, 60.0, 65.0, 120.0, 170.0]);
        assert_eq!(machine.current_rep(), 1);
        assert_eq!(machine.warning_count(), 2);
        assert_eq!(machine.warnings_by_category().get("too deep"), Some(&2));
    }

    #[test]
    fn set_rolls_over_in_the_same_event() {
        let mut machine = squat(3, 2);
        let lap = [120.0, 80.0, 120.0, 170.0];
        let mut observed = Vec::new();
        for _ in 0..3 {
            for event in feed(&mut machine, &lap) {
                observed.push(event.progress.current_rep);
                if event.set_completed {
                    assert_eq!(event.rep_number, Some(3));
                    assert_eq!(event.progress.current_rep, 0);
                    assert_eq!(event.progress.current_set, 1);
                }
            }
        }
        assert!(observed.iter().all(|rep| *rep <= 2));
        assert_eq!(machine.current_set(), 1);
        assert!(!machine.is_complete());
        assert_eq!(machine.total_reps(), 3);
    }

    #[test]
    fn completed_session_ignores_further_samples() {
        let mut machine = squat(1, 1);
        feed(&mut machine, &[120.0, 80.0, 120.0, 170.0]);
        assert!(machine.is_complete());

        let before = machine.progress();
        assert!(machine
            .process(&AngleSample::single(60.0, Duration::from_secs(9)))
            .is_none());
        assert_eq!(machine.progress(), before);
    }

    #[test]
    fn push_up_cycle_counts_reps() {
        let mut machine =
            ExerciseStateMachine::new(ExerciseType::PushUp, SessionGoal::new(10, 1).unwrap());
        feed(&mut machine, &[170.0, 130.0, 80.0, 130.0, 170.0]);
        assert_eq!(machine.current_rep(), 1);
        assert_eq!(machine.warning_count(), 0);
    }

    #[test]
    fn hammer_curl_flags_imbalance_over_twenty_degrees() {
        let mut machine =
            ExerciseStateMachine::new(ExerciseType::HammerCurl, SessionGoal::new(10, 3).unwrap());

        let event = machine
            .process(&AngleSample::pair(90.0, 60.0, Duration::ZERO))
            .unwrap();
        assert!(event.warning.unwrap().contains("30°"));
        assert_eq!(machine.warning_count(), 1);

        let event = machine
            .process(&AngleSample::pair(90.0, 75.0, Duration::from_millis(100)))
            .unwrap();
        assert!(event.warning.is_none());
        assert_eq!(machine.warning_count(), 1);
        assert_eq!(machine.warnings_by_category().get("imbalance"), Some(&1));
    }

    #[test]
    fn hammer_curl_counts_the_leading_arm() {
        let mut machine =
            ExerciseStateMachine::new(ExerciseType::HammerCurl, SessionGoal::new(10, 1).unwrap());
        let samples = [(160.0, 160.0), (100.0, 160.0), (40.0, 160.0), (100.0, 160.0), (160.0, 160.0)];
        let mut completed = 0;
        for (i, (right, left)) in samples.iter().enumerate() {
            let event = machine
                .process(&AngleSample::pair(*right, *left, Duration::from_millis(i as u64 * 100)))
                .unwrap();
            if event.rep_completed {
                completed += 1;
            }
        }
        assert_eq!(completed, 1);
        assert_eq!(machine.current_rep(), 1);
        assert_eq!(
            machine.stage(),
            StageState::Pair {
                right: Stage::Extended,
                left: Stage::Extended
            }
        );
    }

    fn curl(machine: &mut ExerciseStateMachine, frames: &[(f64, f64)]) -> Vec<StageTransition> {
        frames
            .iter()
            .enumerate()
            .filter_map(|(i, (right, left))| {
                machine.process(&AngleSample::pair(*right, *left, Duration::from_millis(i as u64 * 100)))
            })
            .collect()
    }

    #[test]
    fn lagging_arm_after_set_rollover_does_not_add_a_rep() {
        let mut machine =
            ExerciseStateMachine::new(ExerciseType::HammerCurl, SessionGoal::new(1, 2).unwrap());
        // Left arm trails the right by one frame through a single curl.
        let events = curl(
            &mut machine,
            &[
                (160.0, 160.0),
                (100.0, 160.0),
                (40.0, 100.0),
                (100.0, 40.0),
                (160.0, 100.0),
                (160.0, 160.0),
            ],
        );

        assert_eq!(events.iter().filter(|e| e.rep_completed).count(), 1);
        assert!(events[4].set_completed);
        assert!(!events[5].rep_completed);
        assert!(!events[5].set_completed);
        assert_eq!(machine.current_set(), 1);
        assert_eq!(machine.current_rep(), 0);
        assert!(!machine.is_complete());

        // The next curl, again staggered, finishes the second set.
        let events = curl(
            &mut machine,
            &[(100.0, 160.0), (40.0, 100.0), (100.0, 40.0), (160.0, 100.0)],
        );
        assert_eq!(events.iter().filter(|e| e.rep_completed).count(), 1);
        assert!(machine.is_complete());
        assert_eq!(machine.total_reps(), 2);
    }

    #[test]
    fn staggered_arms_within_a_set_count_one_rep_per_curl() {
        let mut machine =
            ExerciseStateMachine::new(ExerciseType::HammerCurl, SessionGoal::new(5, 1).unwrap());
        let one_curl = [
            (160.0, 160.0),
            (100.0, 160.0),
            (40.0, 100.0),
            (100.0, 40.0),
            (160.0, 100.0),
            (160.0, 160.0),
        ];
        let mut completed = 0;
        for _ in 0..3 {
            completed += curl(&mut machine, &one_curl)
                .iter()
                .filter(|e| e.rep_completed)
                .count();
        }
        assert_eq!(completed, 3);
        assert_eq!(machine.current_rep(), 3);
    }

    #[test]
    fn hammer_curl_arm_warnings_name_the_side() {
        let mut machine =
            ExerciseStateMachine::new(ExerciseType::HammerCurl, SessionGoal::new(10, 1).unwrap());
        let event = machine
            .process(&AngleSample::pair(178.0, 165.0, Duration::ZERO))
            .unwrap();
        assert_eq!(
            event.warning.as_deref(),
            Some("Right arm: Elbow locked out, keep tension at the bottom")
        );
    }

    #[test]
    fn sets_with_work_counts_partial_set() {
        let mut machine = squat(2, 3);
        feed(&mut machine, &[120.0, 80.0, 120.0, 170.0, 120.0, 80.0, 120.0, 170.0]);
        feed(&mut machine, &[120.0, 80.0, 120.0, 170.0]);
        assert_eq!(machine.current_set(), 1);
        assert_eq!(machine.current_rep(), 1);
        assert_eq!(machine.sets_with_work(), 2);
        assert_eq!(machine.total_reps(), 3);
    }
}
