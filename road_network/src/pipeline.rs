//! Drives every tile through the stages in order, a time-budgeted slice at a time.

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use instant::Instant;
use serde::{Deserialize, Serialize};

use abstutil::Timer;

use crate::config::NetworkConfig;
use crate::element::ElementStore;
use crate::registry::{Outbox, TileRegistry};
use crate::tile::Tile;
use crate::types::TileCoord;
use crate::{elevation, intersection, lanes, split};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    BoundarySplit,
    JunctionSplit,
    LaneAssembly,
    IntersectionSynthesis,
    Elevation,
    Done,
}

impl Stage {
    pub fn next(self) -> Stage {
        match self {
            Stage::BoundarySplit => Stage::JunctionSplit,
            Stage::JunctionSplit => Stage::LaneAssembly,
            Stage::LaneAssembly => Stage::IntersectionSynthesis,
            Stage::IntersectionSynthesis => Stage::Elevation,
            Stage::Elevation | Stage::Done => Stage::Done,
        }
    }

    /// Before this stage runs, every neighbor must have moved past the returned stage.
    pub fn neighbors_must_pass(self) -> Option<Stage> {
        match self {
            Stage::JunctionSplit => Some(Stage::BoundarySplit),
            Stage::IntersectionSynthesis => Some(Stage::LaneAssembly),
            Stage::Elevation => Some(Stage::IntersectionSynthesis),
            Stage::BoundarySplit | Stage::LaneAssembly | Stage::Done => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Stage::BoundarySplit => "boundary split",
            Stage::JunctionSplit => "junction split",
            Stage::LaneAssembly => "lane assembly",
            Stage::IntersectionSynthesis => "intersection synthesis",
            Stage::Elevation => "elevation",
            Stage::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Why a tile can't run its current stage yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Precondition {
    /// These neighbors must exist and move past `stage` first.
    NeighborsPast {
        stage: Stage,
        missing: Vec<TileCoord>,
    },
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Precondition::NeighborsPast { stage, missing } => {
                write!(f, "waiting for {} neighbors to finish {}", missing.len(), stage)
            }
        }
    }
}

/// What happened during one tick of a tile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepResult {
    /// Ran out of time partway through a stage; the next tick resumes it.
    Suspended(Stage),
    /// Finished a stage.
    Completed(Stage),
    /// Couldn't start the current stage.
    Pending(Precondition),
    /// Nothing left to do.
    Done,
}

/// Where a stage left off.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProgress {
    pub phase: usize,
    pub cursor: usize,
}

impl StageProgress {
    pub(crate) fn next_phase(&mut self) {
        self.phase += 1;
        self.cursor = 0;
    }
}

/// Limits how long one tick runs. At least one item of work always happens.
pub struct TimeBudget {
    started: Instant,
    limit: Option<Duration>,
    items: usize,
}

impl TimeBudget {
    pub fn new(limit: Duration) -> TimeBudget {
        TimeBudget {
            started: Instant::now(),
            limit: Some(limit),
            items: 0,
        }
    }

    pub fn unlimited() -> TimeBudget {
        TimeBudget {
            started: Instant::now(),
            limit: None,
            items: 0,
        }
    }

    /// Call before each item of work. False means stop and suspend.
    pub fn keep_going(&mut self) -> bool {
        self.items += 1;
        if self.items == 1 {
            return true;
        }
        match self.limit {
            Some(limit) => self.started.elapsed() < limit,
            None => true,
        }
    }
}

/// What a stage can see and use besides its own tile.
pub struct StageContext<'a> {
    pub cfg: &'a NetworkConfig,
    /// Every other tile, read-only.
    pub registry: &'a TileRegistry,
    pub budget: &'a mut TimeBudget,
    pub timer: &'a mut Timer,
    pub outbox: &'a mut Outbox,
}

/// What one call to `run_until_idle` accomplished.
#[derive(Debug)]
pub struct RunSummary {
    pub ticks: usize,
    pub done: Vec<TileCoord>,
    /// Tiles that can't make progress, and why.
    pub stuck: Vec<(TileCoord, Precondition)>,
}

/// Owns the tiles and advances them when ticked.
pub struct Pipeline {
    cfg: NetworkConfig,
    registry: TileRegistry,
    unlimited: bool,
}

impl Pipeline {
    pub fn new(cfg: NetworkConfig) -> Pipeline {
        let registry = TileRegistry::new(cfg.tile_size);
        Pipeline {
            cfg,
            registry,
            unlimited: false,
        }
    }

    /// Ignore the per-tick time budget; every tick finishes its stage.
    pub fn without_time_limit(mut self) -> Pipeline {
        self.unlimited = true;
        self
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.cfg
    }

    /// Tiles outside these inclusive coordinates will never be added, so nothing waits for
    /// them.
    pub fn set_extent(&mut self, min: TileCoord, max: TileCoord) {
        self.registry.set_extent(min, max);
    }

    pub fn add_tile(&mut self, coord: TileCoord, elements: ElementStore) -> Result<()> {
        self.registry
            .insert(Tile::new(coord, self.cfg.tile_size, elements))
    }

    pub fn tile(&self, coord: TileCoord) -> Option<&Tile> {
        self.registry.get(coord)
    }

    pub fn registry(&self) -> &TileRegistry {
        &self.registry
    }

    /// Runs one slice of work for one tile.
    pub fn tick(&mut self, coord: TileCoord) -> Result<StepResult> {
        let mut tile = match self.registry.take(coord) {
            Some(tile) => tile,
            None => bail!("{} doesn't exist", coord),
        };
        let result = self.step(&mut tile);
        self.registry.restore(tile);
        Ok(result)
    }

    fn step(&mut self, tile: &mut Tile) -> StepResult {
        let stage = tile.stage;
        if stage == Stage::Done {
            return StepResult::Done;
        }
        if let Some(past) = stage.neighbors_must_pass() {
            let missing = self.registry.neighbors_not_past(tile.coord, past);
            if !missing.is_empty() {
                return StepResult::Pending(Precondition::NeighborsPast {
                    stage: past,
                    missing,
                });
            }
        }

        let mut timer = Timer::new(format!("{} {}", tile.coord, stage));

        // Pick up anything other tiles left here
        match stage {
            Stage::BoundarySplit => {
                for element in self.registry.take_pending_elements(tile.coord) {
                    let idx = tile.elements.add_element(element);
                    tile.inbox.push_back(idx);
                }
            }
            Stage::LaneAssembly => {
                let dummies = self.registry.take_pending_dummies(tile.coord);
                lanes::stage::accept_dummies(tile, dummies, &mut timer);
            }
            _ => {}
        }

        let mut budget = if self.unlimited {
            TimeBudget::unlimited()
        } else {
            TimeBudget::new(self.cfg.frame_budget())
        };
        let mut outbox = Outbox::default();
        let finished = {
            let mut ctx = StageContext {
                cfg: &self.cfg,
                registry: &self.registry,
                budget: &mut budget,
                timer: &mut timer,
                outbox: &mut outbox,
            };
            match stage {
                Stage::BoundarySplit => split::boundary::step(tile, &mut ctx),
                Stage::JunctionSplit => split::junctions::step(tile, &mut ctx),
                Stage::LaneAssembly => lanes::stage::step(tile, &mut ctx),
                Stage::IntersectionSynthesis => intersection::step(tile, &mut ctx),
                Stage::Elevation => elevation::step(tile, &mut ctx),
                Stage::Done => true,
            }
        };
        tile.absorb_warnings(&mut timer);
        self.registry.deliver(outbox);

        if finished {
            tile.stage = stage.next();
            tile.progress = StageProgress::default();
            info!("{} finished {}", tile.coord, stage);
            StepResult::Completed(stage)
        } else {
            StepResult::Suspended(stage)
        }
    }

    /// Round-robins every tile until all are done or none can make progress.
    pub fn run_until_idle(&mut self) -> RunSummary {
        let coords = self.registry.coords();
        let mut ticks = 0;
        loop {
            let mut progress = false;
            for coord in &coords {
                ticks += 1;
                match self.tick(*coord) {
                    Ok(StepResult::Suspended(_)) | Ok(StepResult::Completed(_)) => {
                        progress = true;
                    }
                    Ok(StepResult::Pending(_)) | Ok(StepResult::Done) => {}
                    Err(err) => {
                        warn!("Ticking {} failed: {}", coord, err);
                    }
                }
            }
            if !progress {
                break;
            }
        }

        let mut done = Vec::new();
        let mut stuck = Vec::new();
        for coord in coords {
            let tile = match self.registry.get(coord) {
                Some(tile) => tile,
                None => continue,
            };
            if tile.is_done() {
                done.push(coord);
            } else if let Some(past) = tile.stage().neighbors_must_pass() {
                let missing = self.registry.neighbors_not_past(coord, past);
                warn!("{} is stuck at {}", coord, tile.stage());
                stuck.push((coord, Precondition::NeighborsPast { stage: past, missing }));
            }
        }
        RunSummary { ticks, done, stuck }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order() {
        let mut stage = Stage::BoundarySplit;
        let mut seen = vec![stage];
        while stage != Stage::Done {
            stage = stage.next();
            seen.push(stage);
        }
        assert_eq!(seen.len(), 6);
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(Stage::LaneAssembly.neighbors_must_pass(), None);
    }

    #[test]
    fn budget_always_allows_one_item() {
        let mut budget = TimeBudget::new(Duration::from_secs(0));
        assert!(budget.keep_going());
        assert!(!budget.keep_going());

        let mut unlimited = TimeBudget::unlimited();
        for _ in 0..100 {
            assert!(unlimited.keep_going());
        }
    }

    #[test]
    fn isolated_tile_waits_forever_without_an_extent() {
        let mut pipeline = Pipeline::new(NetworkConfig::default());
        let coord = TileCoord::new(0, 0);
        pipeline.add_tile(coord, ElementStore::new()).unwrap();
        assert_eq!(
            pipeline.tick(coord).unwrap(),
            StepResult::Completed(Stage::BoundarySplit)
        );
        match pipeline.tick(coord).unwrap() {
            StepResult::Pending(Precondition::NeighborsPast { stage, missing }) => {
                assert_eq!(stage, Stage::BoundarySplit);
                assert_eq!(missing.len(), 8);
            }
            x => panic!("unexpected {:?}", x),
        }

        let summary = pipeline.run_until_idle();
        assert!(summary.done.is_empty());
        assert_eq!(summary.stuck.len(), 1);
    }

    #[test]
    fn lone_tile_inside_an_extent_finishes() {
        let mut pipeline = Pipeline::new(NetworkConfig::default());
        let coord = TileCoord::new(0, 0);
        pipeline.set_extent(coord, coord);
        pipeline.add_tile(coord, ElementStore::new()).unwrap();
        let summary = pipeline.run_until_idle();
        assert_eq!(summary.done, vec![coord]);
        assert!(pipeline.tile(coord).unwrap().is_done());
        assert!(pipeline.tick(TileCoord::new(3, 3)).is_err());
    }
}
