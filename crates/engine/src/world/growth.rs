use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::content::ElementCatalog;

use super::grid::{CellCoord, Grid, OccupantId, OccupantVisual};

/// One-shot stage change, keyed by fire time and then by insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthTrigger {
    pub fire_at: Duration,
    pub cell: CellCoord,
    pub occupant: OccupantId,
    pub stage: u16,
    seq: u64,
}

impl Ord for GrowthTrigger {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fire_at
            .cmp(&other.fire_at)
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for GrowthTrigger {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageAdvanced {
    pub cell: CellCoord,
    pub occupant: OccupantId,
    pub stage: u16,
    pub grown: bool,
}

/// Min-heap of pending growth triggers drained against a virtual clock.
#[derive(Debug, Default, Clone)]
pub struct GrowthScheduler {
    queue: BinaryHeap<Reverse<GrowthTrigger>>,
    next_seq: u64,
}

impl GrowthScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues stages `1..stage_count`; stage `i` fires at
    /// `now + stage_duration * i + jitter` with `jitter` drawn from
    /// `[0, stage_duration)`. Stage 0 is applied by the planter.
    pub fn schedule_crop(
        &mut self,
        now: Duration,
        cell: CellCoord,
        occupant: OccupantId,
        stage_count: u16,
        stage_duration: Duration,
        rng: &mut impl Rng,
    ) -> usize {
        let duration_micros = stage_duration.as_micros().min(u128::from(u64::MAX)) as u64;
        let mut scheduled = 0;
        for stage in 1..stage_count {
            let jitter = if duration_micros == 0 {
                Duration::ZERO
            } else {
                Duration::from_micros(rng.gen_range(0..duration_micros))
            };
            let fire_at = now
                .saturating_add(stage_duration.saturating_mul(u32::from(stage)))
                .saturating_add(jitter);
            self.queue.push(Reverse(GrowthTrigger {
                fire_at,
                cell,
                occupant,
                stage,
                seq: self.next_seq,
            }));
            self.next_seq = self.next_seq.saturating_add(1);
            scheduled += 1;
        }
        scheduled
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn next_fire_at(&self) -> Option<Duration> {
        self.queue.peek().map(|Reverse(trigger)| trigger.fire_at)
    }

    /// Fires every trigger due at `now`, earliest first. A trigger whose cell
    /// no longer holds its occupant is dropped without touching the grid.
    pub fn advance(
        &mut self,
        now: Duration,
        grid: &mut Grid,
        catalog: &ElementCatalog,
    ) -> Vec<StageAdvanced> {
        let mut applied = Vec::new();
        while self
            .queue
            .peek()
            .is_some_and(|Reverse(trigger)| trigger.fire_at <= now)
        {
            let Some(Reverse(trigger)) = self.queue.pop() else {
                break;
            };

            let current = grid.occupant(trigger.cell).copied();
            let Some(occupant) = current.filter(|occupant| occupant.id == trigger.occupant) else {
                debug!(
                    cell = %trigger.cell,
                    stage = trigger.stage,
                    "growth_trigger_stale"
                );
                continue;
            };

            let current_stage = match occupant.visual {
                OccupantVisual::Stage(stage) => stage,
                _ => 0,
            };
            if trigger.stage <= current_stage {
                continue;
            }

            let visual = OccupantVisual::Stage(trigger.stage);
            grid.set_occupant_visual(trigger.cell, visual);
            let grown = catalog
                .get(occupant.element)
                .is_some_and(|def| def.is_grown(visual));
            applied.push(StageAdvanced {
                cell: trigger.cell,
                occupant: trigger.occupant,
                stage: trigger.stage,
                grown,
            });
        }
        applied
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::content::{ElementBehavior, ElementDef, ElementId, GrowthSpec};
    use crate::world::grid::{GroundKind, Occupant};

    const STAGE: Duration = Duration::from_secs(10);

    fn catalog(stages: usize) -> ElementCatalog {
        ElementCatalog::from_defs(vec![ElementDef::new(
            "crop.melon",
            "Melon",
            "crops/melon",
            ElementBehavior::AreaPrompted,
        )
        .with_growth(GrowthSpec {
            stage_sprites: (0..stages).map(|idx| format!("crops/melon_{idx}")).collect(),
            stage_duration_units: 1000,
        })])
    }

    fn planted(grid: &mut Grid, cell: CellCoord, id: u64) -> OccupantId {
        let occupant = Occupant {
            id: OccupantId(id),
            element: ElementId(0),
            visual: OccupantVisual::Stage(0),
        };
        grid.set_occupant(cell, occupant);
        occupant.id
    }

    fn stage_at(grid: &Grid, cell: CellCoord) -> Option<u16> {
        match grid.occupant(cell)?.visual {
            OccupantVisual::Stage(stage) => Some(stage),
            _ => None,
        }
    }

    fn setup() -> (Grid, ChaCha8Rng) {
        (
            Grid::new(5, 5, |_| GroundKind::FarmPlowed).expect("grid"),
            ChaCha8Rng::seed_from_u64(7),
        )
    }

    #[test]
    fn schedules_one_trigger_per_later_stage() {
        let (mut grid, mut rng) = setup();
        let cell = CellCoord::new(2, 2);
        let id = planted(&mut grid, cell, 1);
        let mut scheduler = GrowthScheduler::new();

        let count = scheduler.schedule_crop(Duration::ZERO, cell, id, 4, STAGE, &mut rng);
        assert_eq!(count, 3);
        assert_eq!(scheduler.pending(), 3);

        let single = scheduler.schedule_crop(Duration::ZERO, cell, id, 1, STAGE, &mut rng);
        assert_eq!(single, 0);
    }

    #[test]
    fn trigger_times_fall_inside_their_stage_window() {
        let (mut grid, mut rng) = setup();
        let cell = CellCoord::new(1, 1);
        let id = planted(&mut grid, cell, 1);
        let mut scheduler = GrowthScheduler::new();
        let planted_at = Duration::from_secs(3);
        scheduler.schedule_crop(planted_at, cell, id, 6, STAGE, &mut rng);

        let mut previous = planted_at;
        while let Some(Reverse(trigger)) = scheduler.queue.pop() {
            let low = planted_at + STAGE * u32::from(trigger.stage);
            let high = low + STAGE;
            assert!(trigger.fire_at >= low && trigger.fire_at < high);
            assert!(trigger.fire_at >= previous);
            previous = trigger.fire_at;
        }
    }

    #[test]
    fn stages_apply_in_order_against_virtual_clock() {
        let (mut grid, mut rng) = setup();
        let catalog = catalog(4);
        let cell = CellCoord::new(2, 2);
        let id = planted(&mut grid, cell, 1);
        let mut scheduler = GrowthScheduler::new();
        scheduler.schedule_crop(Duration::ZERO, cell, id, 4, STAGE, &mut rng);

        assert!(scheduler.advance(Duration::from_secs(9), &mut grid, &catalog).is_empty());
        assert_eq!(stage_at(&grid, cell), Some(0));

        let mut last_stage = 0;
        for seconds in (10..=40).step_by(5) {
            for advanced in scheduler.advance(Duration::from_secs(seconds), &mut grid, &catalog) {
                assert!(advanced.stage > last_stage);
                last_stage = advanced.stage;
            }
            assert_eq!(stage_at(&grid, cell), Some(last_stage));
        }
        assert_eq!(last_stage, 3);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn final_stage_reports_grown() {
        let (mut grid, mut rng) = setup();
        let catalog = catalog(3);
        let cell = CellCoord::new(2, 2);
        let id = planted(&mut grid, cell, 1);
        let mut scheduler = GrowthScheduler::new();
        scheduler.schedule_crop(Duration::ZERO, cell, id, 3, STAGE, &mut rng);

        let applied = scheduler.advance(Duration::from_secs(60), &mut grid, &catalog);
        assert_eq!(applied.len(), 2);
        assert!(!applied[0].grown);
        assert!(applied[1].grown);
        assert_eq!(stage_at(&grid, cell), Some(2));
    }

    #[test]
    fn cleared_cell_is_not_resurrected() {
        let (mut grid, mut rng) = setup();
        let catalog = catalog(4);
        let cell = CellCoord::new(3, 3);
        let id = planted(&mut grid, cell, 1);
        let mut scheduler = GrowthScheduler::new();
        scheduler.schedule_crop(Duration::ZERO, cell, id, 4, STAGE, &mut rng);

        grid.clear_occupant(cell);
        let applied = scheduler.advance(Duration::from_secs(100), &mut grid, &catalog);

        assert!(applied.is_empty());
        assert!(!grid.is_occupied(cell));
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn replanted_cell_ignores_previous_crop_triggers() {
        let (mut grid, mut rng) = setup();
        let catalog = catalog(4);
        let cell = CellCoord::new(3, 3);
        let old = planted(&mut grid, cell, 1);
        let mut scheduler = GrowthScheduler::new();
        scheduler.schedule_crop(Duration::ZERO, cell, old, 4, STAGE, &mut rng);

        grid.clear_occupant(cell);
        let new = planted(&mut grid, cell, 2);
        scheduler.schedule_crop(Duration::from_secs(30), cell, new, 4, STAGE, &mut rng);

        let applied = scheduler.advance(Duration::from_secs(39), &mut grid, &catalog);
        assert!(applied.iter().all(|advanced| advanced.occupant == new));
        assert_eq!(stage_at(&grid, cell), Some(0));
    }

    #[test]
    fn zero_duration_fires_everything_immediately_in_stage_order() {
        let (mut grid, mut rng) = setup();
        let catalog = catalog(5);
        let cell = CellCoord::new(1, 3);
        let id = planted(&mut grid, cell, 1);
        let mut scheduler = GrowthScheduler::new();
        scheduler.schedule_crop(Duration::ZERO, cell, id, 5, Duration::ZERO, &mut rng);

        let stages = scheduler
            .advance(Duration::ZERO, &mut grid, &catalog)
            .into_iter()
            .map(|advanced| advanced.stage)
            .collect::<Vec<_>>();
        assert_eq!(stages, vec![1, 2, 3, 4]);
    }

    #[test]
    fn next_fire_at_tracks_earliest_trigger() {
        let (mut grid, mut rng) = setup();
        let cell = CellCoord::new(1, 1);
        let id = planted(&mut grid, cell, 1);
        let mut scheduler = GrowthScheduler::new();
        assert_eq!(scheduler.next_fire_at(), None);

        scheduler.schedule_crop(Duration::ZERO, cell, id, 3, STAGE, &mut rng);
        let first = scheduler.next_fire_at().expect("pending");
        assert!(first >= STAGE && first < STAGE * 2);

        scheduler.clear();
        assert_eq!(scheduler.pending(), 0);
    }
}
