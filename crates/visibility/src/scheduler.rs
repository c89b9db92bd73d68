use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use skillcity_common::{Camera, EntityId};
use skillcity_kernel::City;

use crate::timer::FrameBudget;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Conditionally active entities farther than this from the camera are
    /// not updated.
    pub cutoff_distance: f32,
    /// Update cost above which a frame is reported as over budget.
    pub frame_budget_ms: f32,
    /// Frames kept for the rolling cost average.
    pub history: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cutoff_distance: 150.0,
            frame_budget_ms: 16.6,
            history: 120,
        }
    }
}

/// What happened during one scheduled frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub always_updated: usize,
    pub conditional_updated: usize,
    pub culled_distance: usize,
    pub culled_frustum: usize,
    pub failures: usize,
    pub elapsed: Duration,
}

impl FrameStats {
    pub fn updated(&self) -> usize {
        self.always_updated + self.conditional_updated
    }
}

impl std::fmt::Display for FrameStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "updated {} (always {}, visible {}), culled {} by distance / {} by frustum, {} failed, {:?}",
            self.updated(),
            self.always_updated,
            self.conditional_updated,
            self.culled_distance,
            self.culled_frustum,
            self.failures,
            self.elapsed
        )
    }
}

/// Decides each frame which entities get an `update` call.
///
/// Always-active entities are updated unconditionally. Everything else is
/// skipped when its bounds center is beyond the cutoff distance, or when its
/// bounds are outside the camera frustum. A failing entity is logged and
/// does not stop the rest of the frame.
#[derive(Debug)]
pub struct UpdateScheduler {
    config: SchedulerConfig,
    budget: FrameBudget,
    last: FrameStats,
    frames: u64,
    always: Vec<EntityId>,
    conditional: Vec<EntityId>,
}

impl Default for UpdateScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl UpdateScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        // An infinite budget never trips.
        let budget = Duration::try_from_secs_f32(config.frame_budget_ms.max(0.0) / 1000.0).unwrap_or(Duration::MAX);
        Self {
            budget: FrameBudget::new(budget, config.history),
            config,
            last: FrameStats::default(),
            frames: 0,
            always: Vec::new(),
            conditional: Vec::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn last_frame(&self) -> FrameStats {
        self.last
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn budget(&self) -> &FrameBudget {
        &self.budget
    }

    pub fn run_frame(&mut self, city: &mut City, time: f32, camera: &Camera) -> FrameStats {
        let _span = tracing::info_span!("frame_update", frame = self.frames).entered();
        let start = Instant::now();
        let frustum = camera.frustum();
        let cutoff_sq = self.config.cutoff_distance * self.config.cutoff_distance;
        let mut stats = FrameStats::default();

        self.always.clear();
        self.always.extend(city.visibility().always());
        self.conditional.clear();
        self.conditional.extend(city.visibility().conditional());

        for &id in &self.always {
            let Some(entity) = city.entity_mut(id) else {
                continue;
            };
            match entity.update(time, camera) {
                Ok(()) => stats.always_updated += 1,
                Err(e) => {
                    stats.failures += 1;
                    tracing::warn!(%id, "entity update failed: {e}");
                }
            }
        }

        for &id in &self.conditional {
            let Some(entity) = city.entity_mut(id) else {
                continue;
            };
            let bounds = entity.bounds();
            if camera.position.distance_squared(bounds.center()) > cutoff_sq {
                stats.culled_distance += 1;
                continue;
            }
            if !frustum.intersects_aabb(&bounds) {
                stats.culled_frustum += 1;
                continue;
            }
            match entity.update(time, camera) {
                Ok(()) => stats.conditional_updated += 1,
                Err(e) => {
                    stats.failures += 1;
                    tracing::warn!(%id, "entity update failed: {e}");
                }
            }
        }

        stats.elapsed = start.elapsed();
        if self.budget.record(stats.elapsed) {
            tracing::warn!(
                elapsed = ?stats.elapsed,
                budget = ?self.budget.budget(),
                "frame update over budget"
            );
        }
        tracing::trace!(%stats, "frame scheduled");
        self.frames += 1;
        self.last = stats;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};
    use skillcity_assets::ResourceCache;
    use skillcity_common::EntityKind;
    use skillcity_kernel::{CityBuilder, CityConfig, LandmarkConfig};

    fn small_city() -> City {
        let mut config = CityConfig::default();
        config.residential.count = 30;
        CityBuilder::new(config).build(ResourceCache::new()).unwrap()
    }

    fn count_of(city: &City, id: EntityId) -> u64 {
        city.entity(id).unwrap().update_count()
    }

    #[test]
    fn landmarks_update_once_per_frame_wherever_the_camera_is() {
        let mut city = small_city();
        let mut scheduler = UpdateScheduler::default();
        // Far away and looking at the sky.
        let camera = Camera::looking_at(Vec3::new(5000.0, 10.0, 5000.0), Vec3::new(5000.0, 500.0, 6000.0));
        let landmarks: Vec<EntityId> = city.visibility().always().collect();

        for frame in 1..=3 {
            let stats = scheduler.run_frame(&mut city, frame as f32 * 0.016, &camera);
            assert_eq!(stats.always_updated, landmarks.len());
            assert_eq!(stats.conditional_updated, 0);
            for id in &landmarks {
                assert_eq!(count_of(&city, *id), frame);
            }
        }
    }

    #[test]
    fn far_and_hidden_entities_are_not_updated() {
        let mut city = small_city();
        let mut scheduler = UpdateScheduler::new(SchedulerConfig {
            cutoff_distance: 60.0,
            ..SchedulerConfig::default()
        });
        // Standing at the east edge looking further east, away from the city.
        let camera = Camera::looking_at(Vec3::new(110.0, 2.0, 0.0), Vec3::new(200.0, 2.0, 0.0));
        let stats = scheduler.run_frame(&mut city, 1.0, &camera);
        assert!(stats.culled_distance > 0);
        assert!(stats.culled_frustum > 0);

        let frustum = camera.frustum();
        for id in city.visibility().conditional().collect::<Vec<_>>() {
            let e = city.entity(id).unwrap();
            let far = camera.position.distance(e.bounds().center()) > 60.0;
            if far || !frustum.intersects_aabb(&e.bounds()) {
                assert_eq!(e.update_count(), 0, "{id} should have been skipped");
            } else {
                assert_eq!(e.update_count(), 1);
            }
        }
    }

    #[test]
    fn visible_nearby_entities_are_updated() {
        let mut city = small_city();
        let mut scheduler = UpdateScheduler::default();
        let camera = Camera::looking_at(Vec3::new(0.0, 80.0, 120.0), Vec3::ZERO);
        let stats = scheduler.run_frame(&mut city, 0.5, &camera);
        assert!(stats.conditional_updated > 0);
        assert_eq!(
            stats.updated() + stats.culled_distance + stats.culled_frustum + stats.failures,
            city.visibility().len()
        );
    }

    #[test]
    fn one_failing_entity_does_not_stop_the_frame() {
        let mut city = small_city();
        let broken = city.visibility().always().next().unwrap();
        city.entity_mut(broken).unwrap().dispose();

        let mut scheduler = UpdateScheduler::default();
        let stats = scheduler.run_frame(&mut city, 0.0, &Camera::default());
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.always_updated, city.visibility().always().count() - 1);
        assert_eq!(scheduler.frames(), 1);
        assert_eq!(scheduler.last_frame(), stats);
    }

    #[test]
    fn custom_landmark_set_is_always_active() {
        let mut config = CityConfig::default();
        config.landmarks = vec![LandmarkConfig {
            kind: EntityKind::ProviderB,
            position: Vec2::new(-100.0, -100.0),
            dimensions: Vec3::new(10.0, 20.0, 10.0),
            color: skillcity_common::Color::WHITE,
            title: "Far".into(),
            description: String::new(),
            texture: None,
        }];
        let mut city = CityBuilder::new(config).build(ResourceCache::new()).unwrap();
        let camera = Camera::looking_at(Vec3::new(100.0, 10.0, 100.0), Vec3::new(200.0, 10.0, 200.0));
        let stats = UpdateScheduler::default().run_frame(&mut city, 0.0, &camera);
        assert_eq!(stats.always_updated, 1);
    }

    #[test]
    fn unbounded_budget_does_not_panic() {
        let scheduler = UpdateScheduler::new(SchedulerConfig {
            frame_budget_ms: f32::INFINITY,
            ..SchedulerConfig::default()
        });
        assert_eq!(scheduler.budget().budget(), Duration::MAX);
        let scheduler = UpdateScheduler::new(SchedulerConfig {
            frame_budget_ms: f32::NAN,
            ..SchedulerConfig::default()
        });
        assert_eq!(scheduler.budget().budget(), Duration::ZERO);
    }
}
