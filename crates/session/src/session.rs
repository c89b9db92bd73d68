use glam::{Vec2, Vec3};
use skillcity_assets::{
    AssetLoader, GeometryHandle, GeometryKind, LoadQueue, LoadRequest, LoadTicket, LoadedAsset,
    MaterialHandle, MaterialKind, MaterialParams, ResourceCache,
};
use skillcity_common::{Aabb, Camera, Color, EntityId, Transform};
use skillcity_input::{Action, InputState};
use skillcity_kernel::{City, CityBuilder};
use skillcity_player::{Capsule, OrbitControls, PlayerController};
use skillcity_render::DrawList;
use skillcity_visibility::{FrameStats, UpdateScheduler};

use crate::config::{CameraMode, SessionConfig, SessionError};
use crate::info::InfoSink;

/// Longest step the simulation takes in one frame; a stalled host must not
/// teleport the player through buildings.
const MAX_FRAME_DT: f32 = 0.1;

/// One running city and everything that drives it.
pub struct CitySession {
    city: City,
    scheduler: UpdateScheduler,
    player: PlayerController,
    orbit: OrbitControls,
    camera: Camera,
    mode: CameraMode,
    loads: LoadQueue,
    loader: Box<dyn AssetLoader>,
    avatar_ticket: Option<LoadTicket>,
    player_visual: (GeometryHandle, MaterialHandle),
    colliders: Vec<Aabb>,
    viewport: Vec2,
    clock: f32,
    frames: u64,
    highlighted: Option<EntityId>,
    revealed: Option<EntityId>,
    disposed: bool,
}

impl std::fmt::Debug for CitySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CitySession")
            .field("entities", &self.city.entity_count())
            .field("mode", &self.mode)
            .field("frames", &self.frames)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl CitySession {
    /// Assemble the city and start the asset loads it needs.
    pub fn new(config: SessionConfig, loader: Box<dyn AssetLoader>) -> Result<Self, SessionError> {
        config.validate()?;
        let mut city = CityBuilder::new(config.city).build(ResourceCache::new())?;
        let mut loads = LoadQueue::new();
        let textures = city.request_textures(&mut loads, loader.as_ref());
        let avatar_ticket = config
            .avatar_model
            .map(|path| LoadRequest::Model { path })
            .and_then(|request| loads.request(loader.as_ref(), request));

        let capsule = Capsule::fitting(config.player.half_extents);
        let cache = city.cache_mut();
        let player_visual = (
            cache.geometry(GeometryKind::Capsule, &[capsule.radius, capsule.length])?,
            cache.material(
                MaterialKind::Standard,
                &MaterialParams::colored(Color::from_hex(0xf2c14e)).with_surface(0.5, 0.0),
            )?,
        );

        let colliders = city.colliders();
        let player = PlayerController::new(config.player);
        let orbit = OrbitControls::new(config.orbit);
        let (width, height) = config.viewport;
        let mut camera = Camera::default();
        camera.set_viewport(width, height);

        let mut session = Self {
            city,
            scheduler: UpdateScheduler::new(config.visibility),
            player,
            orbit,
            camera,
            mode: config.camera_mode,
            loads,
            loader,
            avatar_ticket,
            player_visual,
            colliders,
            viewport: Vec2::new(width.max(1) as f32, height.max(1) as f32),
            clock: 0.0,
            frames: 0,
            highlighted: None,
            revealed: None,
            disposed: false,
        };
        session.place_camera();
        tracing::info!(
            entities = session.city.entity_count(),
            textures,
            avatar = session.avatar_ticket.is_some(),
            "session started"
        );
        Ok(session)
    }

    pub fn city(&self) -> &City {
        &self.city
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Direct camera access for hosts that position it themselves. Orbit and
    /// character modes overwrite it on the next frame.
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn player(&self) -> &PlayerController {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut PlayerController {
        &mut self.player
    }

    pub fn orbit_mut(&mut self) -> &mut OrbitControls {
        &mut self.orbit
    }

    pub fn scheduler(&self) -> &UpdateScheduler {
        &self.scheduler
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    pub fn clock(&self) -> f32 {
        self.clock
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn highlighted(&self) -> Option<EntityId> {
        self.highlighted
    }

    /// Entity whose info the approach reveal is currently showing.
    pub fn revealed(&self) -> Option<EntityId> {
        self.revealed
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Player ground position for the minimap.
    pub fn minimap_position(&self) -> Vec2 {
        self.player.ground_position()
    }

    pub fn set_mode(&mut self, mode: CameraMode) {
        if mode != self.mode {
            tracing::debug!(?mode, "camera mode changed");
            self.mode = mode;
            self.place_camera();
        }
    }

    pub fn toggle_mode(&mut self) -> CameraMode {
        self.set_mode(self.mode.toggled());
        self.mode
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = Vec2::new(width.max(1) as f32, height.max(1) as f32);
        self.camera.set_viewport(width, height);
    }

    /// Route a host action. Movement and interact fold into `input`; clicks
    /// and the camera toggle are handled here. Returns `false` for actions
    /// the host owns (the inspector toggle).
    pub fn handle_action(&mut self, action: &Action, input: &mut InputState, sink: &mut dyn InfoSink) -> bool {
        match *action {
            Action::Click { x, y } => {
                self.click(x, y, sink);
                true
            }
            Action::ToggleCameraMode => {
                self.toggle_mode();
                true
            }
            Action::ToggleInspector => false,
            _ => input.apply(action),
        }
    }

    /// Advance one frame.
    pub fn frame(&mut self, dt: f32, input: &mut InputState, sink: &mut dyn InfoSink) -> FrameStats {
        if self.disposed {
            return FrameStats::default();
        }
        let dt = if dt.is_finite() { dt.clamp(0.0, MAX_FRAME_DT) } else { 0.0 };
        self.apply_loads();
        self.clock += dt;

        match self.mode {
            CameraMode::Character => {
                let forward = self.camera.horizontal_forward();
                self.player.tick(dt, input, forward, &self.colliders);
                if input.take_interact() {
                    self.reveal_nearest(sink);
                } else {
                    self.hide_if_out_of_range(sink);
                }
            }
            CameraMode::Orbit => {
                // The pulse only means something in character mode.
                input.take_interact();
                self.orbit.update(dt);
            }
        }
        self.place_camera();

        let stats = self.scheduler.run_frame(&mut self.city, self.clock, &self.camera);
        self.frames += 1;
        stats
    }

    fn place_camera(&mut self) {
        match self.mode {
            CameraMode::Character => self.player.follow_camera(&mut self.camera),
            CameraMode::Orbit => self.orbit.apply(&mut self.camera),
        }
    }

    fn apply_loads(&mut self) {
        for event in self.loads.drain() {
            if self.city.apply_load_event(&event) {
                continue;
            }
            if self.avatar_ticket != Some(event.ticket) {
                tracing::debug!(ticket = event.ticket.0, "load completion nobody asked for");
                continue;
            }
            self.avatar_ticket = None;
            match event.outcome {
                Ok(LoadedAsset::Model(model)) => self.player.attach_model(model),
                Ok(LoadedAsset::Texture(_)) => {
                    tracing::warn!(path = event.request.path(), "expected a model, got a texture");
                }
                Err(e) => tracing::warn!("character model failed to load, keeping placeholder: {e}"),
            }
        }
    }

    fn reveal_nearest(&mut self, sink: &mut dyn InfoSink) {
        let radius = self.player.config().interaction_radius;
        let Some(id) = self.city.nearest_info(self.player.position(), radius) else {
            return;
        };
        if let Some(info) = self.city.entity(id).and_then(|e| e.info()) {
            sink.show_info(id, info);
            self.revealed = Some(id);
        }
    }

    fn hide_if_out_of_range(&mut self, sink: &mut dyn InfoSink) {
        let Some(id) = self.revealed else {
            return;
        };
        let radius = self.player.config().interaction_radius;
        let in_range = self
            .city
            .entity(id)
            .is_some_and(|e| e.is_alive() && e.bounds().ground_distance(self.player.position()) <= radius);
        if !in_range {
            self.revealed = None;
            sink.hide_info();
        }
    }

    /// Resolve a click in window pixels. A hit on an entity with an info
    /// record shows it once and highlights the entity; anything else hides
    /// the panel. Returns the entity shown.
    pub fn click(&mut self, x: f32, y: f32, sink: &mut dyn InfoSink) -> Option<EntityId> {
        if self.disposed {
            return None;
        }
        let ray = self.camera.screen_ray(Vec2::new(x, y), self.viewport);
        let hit = self
            .city
            .pick(&ray)
            .and_then(|id| Some((id, self.city.entity(id)?.info()?.clone())));

        let previous = self.highlighted.take();
        if let Some(prev) = previous.filter(|p| hit.as_ref().is_none_or(|(id, _)| id != p)) {
            if let Some(entity) = self.city.entity_mut(prev) {
                entity.unhighlight();
            }
        }

        match hit {
            Some((id, info)) => {
                if let Some(entity) = self.city.entity_mut(id) {
                    entity.highlight();
                }
                self.highlighted = Some(id);
                tracing::debug!(%id, title = %info.title, "entity picked");
                sink.show_info(id, &info);
                Some(id)
            }
            None => {
                self.revealed = None;
                sink.hide_info();
                None
            }
        }
    }

    /// Flatten the city and the player into a draw list.
    pub fn draw_list(&self) -> DrawList {
        let mut list = DrawList::from_city(&self.city);
        if !self.disposed {
            let bounds = self.player.bounds();
            let transform = Transform::from_position(bounds.center())
                .with_rotation(glam::Quat::from_rotation_y(self.player.yaw()));
            let (geometry, material) = self.player_visual;
            list.push_mesh(self.city.cache(), geometry, material, &transform);
        }
        list
    }

    /// Tear everything down. Safe to call repeatedly; returns `true` only for
    /// the call that did the work.
    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            tracing::debug!("session already disposed");
            return false;
        }
        self.disposed = true;
        self.loads.close();
        self.avatar_ticket = None;
        self.highlighted = None;
        self.revealed = None;
        self.colliders.clear();
        self.city.dispose();
        true
    }

    /// World point under a window pixel on the ground plane, if any.
    pub fn ground_point(&self, x: f32, y: f32) -> Option<Vec3> {
        let ray = self.camera.screen_ray(Vec2::new(x, y), self.viewport);
        ray.intersect_ground(0.0).map(|t| ray.point_at(t))
    }
}

impl Drop for CitySession {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::info::{InfoEvent, RecordingSink};
    use skillcity_assets::{AnimationClip, AssetLoadError, LoadReply, ModelAsset, TextureAsset};
    use skillcity_input::Control;
    use skillcity_player::MotionState;

    /// Completes every request immediately.
    struct InstantLoader;

    impl AssetLoader for InstantLoader {
        fn start(&self, reply: LoadReply) {
            let outcome = match reply.request().clone() {
                LoadRequest::Texture { path } => Ok(LoadedAsset::Texture(TextureAsset {
                    path,
                    width: 64,
                    height: 64,
                })),
                LoadRequest::Model { path } => Ok(LoadedAsset::Model(ModelAsset {
                    path,
                    root_node: "Armature".into(),
                    nodes: vec!["Armature".into()],
                    animation_clips: vec![
                        AnimationClip { name: "Idle".into(), channels: 4 },
                        AnimationClip { name: "Walk".into(), channels: 4 },
                        AnimationClip { name: "Run".into(), channels: 4 },
                    ],
                })),
            };
            reply.complete(outcome);
        }
    }

    /// Fails every request.
    struct BrokenLoader;

    impl AssetLoader for BrokenLoader {
        fn start(&self, reply: LoadReply) {
            let path = reply.request().path().to_string();
            reply.complete(Err(AssetLoadError::Io {
                path,
                reason: "not found".into(),
            }));
        }
    }

    /// Holds replies until the test completes them.
    #[derive(Clone, Default)]
    struct DeferredLoader {
        pending: Rc<RefCell<Vec<LoadReply>>>,
    }

    impl AssetLoader for DeferredLoader {
        fn start(&self, reply: LoadReply) {
            self.pending.borrow_mut().push(reply);
        }
    }

    fn config() -> SessionConfig {
        let mut config = SessionConfig::default();
        config.city.residential.count = 20;
        config.viewport = (800, 600);
        config
    }

    fn session(loader: impl AssetLoader + 'static) -> CitySession {
        CitySession::new(config(), Box::new(loader)).unwrap()
    }

    fn main_landmark(session: &CitySession) -> EntityId {
        session.city().visibility().always().next().unwrap()
    }

    /// Point the camera straight down at the top of an entity.
    fn look_down_at(session: &mut CitySession, id: EntityId) {
        let bounds = session.city().entity(id).unwrap().bounds();
        let center = bounds.center();
        let camera = session.camera_mut();
        camera.position = Vec3::new(center.x, bounds.max.y + 30.0, center.z + 0.5);
        camera.target = Vec3::new(center.x, center.y, center.z);
    }

    #[test]
    fn loads_are_applied_on_the_first_frame() {
        let mut s = session(InstantLoader);
        assert!(s.city().pending_textures() > 0);
        assert!(s.player().avatar().is_placeholder());

        s.frame(0.016, &mut InputState::new(), &mut RecordingSink::new());
        assert_eq!(s.city().pending_textures(), 0);
        assert!(!s.player().avatar().is_placeholder());
        assert_eq!(s.player().avatar().active_clip(), Some("Idle"));
    }

    #[test]
    fn failed_loads_keep_placeholders() {
        let mut s = session(BrokenLoader);
        let mut sink = RecordingSink::new();
        let stats = s.frame(0.016, &mut InputState::new(), &mut sink);
        assert!(s.player().avatar().is_placeholder());
        assert_eq!(s.city().pending_textures(), 0);
        assert!(stats.always_updated > 0);
        assert!(sink.events.is_empty());
    }

    #[test]
    fn clicking_a_landmark_shows_its_info_once() {
        let mut s = session(InstantLoader);
        let id = main_landmark(&s);
        look_down_at(&mut s, id);
        let mut sink = RecordingSink::new();

        assert_eq!(s.click(400.0, 300.0, &mut sink), Some(id));
        assert_eq!(sink.shows(), 1);
        assert_eq!(sink.hides(), 0);
        let expected = s.city().entity(id).unwrap().info().unwrap().clone();
        assert_eq!(sink.last(), Some(&InfoEvent::Show(id, expected)));
        assert!(s.city().entity(id).unwrap().is_highlighted());
        assert_eq!(s.highlighted(), Some(id));
    }

    #[test]
    fn clicking_empty_ground_hides_info() {
        let mut s = session(InstantLoader);
        let id = main_landmark(&s);
        look_down_at(&mut s, id);
        let mut sink = RecordingSink::new();
        s.click(400.0, 300.0, &mut sink);

        // Inside the plaza, away from the fountain and benches.
        let camera = s.camera_mut();
        camera.position = Vec3::new(12.0, 20.0, -12.0);
        camera.target = Vec3::new(12.0, 0.0, -11.9);
        assert_eq!(s.click(400.0, 300.0, &mut sink), None);
        assert_eq!(sink.last(), Some(&InfoEvent::Hide));
        assert_eq!(sink.shows(), 1);
        assert!(!s.city().entity(id).unwrap().is_highlighted());
        assert_eq!(s.highlighted(), None);
    }

    #[test]
    fn walking_forward_in_character_mode() {
        let mut s = session(InstantLoader);
        s.set_mode(CameraMode::Character);
        let start = s.player().position();
        let speed = s.player().config().walk_speed;
        let mut input = InputState::new().with(Control::Forward);
        let mut sink = RecordingSink::new();
        for _ in 0..60 {
            s.frame(1.0 / 60.0, &mut input, &mut sink);
        }
        let moved = s.player().position() - start;
        assert!((moved - Vec3::new(0.0, 0.0, -speed)).length() < 1e-2, "{moved:?}");
        assert_eq!(s.player().state(), MotionState::Walking);
        assert_eq!(s.minimap_position(), Vec2::new(s.player().position().x, s.player().position().z));
        // The follow camera sits behind the player.
        assert!(s.camera().position.z > s.player().position().z);
    }

    #[test]
    fn interact_reveals_nearby_info_and_hides_out_of_range() {
        let mut s = session(InstantLoader);
        s.set_mode(CameraMode::Character);
        let id = main_landmark(&s);
        let bounds = s.city().entity(id).unwrap().bounds();
        // Just outside the landmark's east face.
        s.player_mut()
            .set_position(Vec3::new(bounds.max.x + 2.0, 0.0, bounds.center().z));
        let mut sink = RecordingSink::new();

        let mut input = InputState::new();
        input.apply(&Action::Interact);
        s.frame(0.016, &mut input, &mut sink);
        assert_eq!(s.revealed(), Some(id));
        assert!(matches!(sink.last(), Some(InfoEvent::Show(shown, _)) if *shown == id));

        s.player_mut().set_position(Vec3::new(0.0, 0.0, 60.0));
        s.frame(0.016, &mut InputState::new(), &mut sink);
        assert_eq!(s.revealed(), None);
        assert_eq!(sink.last(), Some(&InfoEvent::Hide));
    }

    #[test]
    fn missed_click_closes_the_revealed_panel_once() {
        let mut s = session(InstantLoader);
        s.set_mode(CameraMode::Character);
        let id = main_landmark(&s);
        let bounds = s.city().entity(id).unwrap().bounds();
        s.player_mut()
            .set_position(Vec3::new(bounds.max.x + 2.0, 0.0, bounds.center().z));
        let mut sink = RecordingSink::new();
        let mut input = InputState::new();
        input.apply(&Action::Interact);
        s.frame(0.016, &mut input, &mut sink);
        assert_eq!(s.revealed(), Some(id));

        let camera = s.camera_mut();
        camera.position = Vec3::new(12.0, 20.0, -12.0);
        camera.target = Vec3::new(12.0, 0.0, -11.9);
        assert_eq!(s.click(400.0, 300.0, &mut sink), None);
        assert_eq!(s.revealed(), None);
        assert_eq!(sink.hides(), 1);

        s.player_mut().set_position(Vec3::new(0.0, 0.0, 60.0));
        s.frame(0.016, &mut InputState::new(), &mut sink);
        assert_eq!(sink.hides(), 1);
        assert_eq!(sink.last(), Some(&InfoEvent::Hide));
    }

    #[test]
    fn orbit_mode_ignores_interact() {
        let mut s = session(InstantLoader);
        let mut input = InputState::new();
        input.apply(&Action::Interact);
        let mut sink = RecordingSink::new();
        s.frame(0.016, &mut input, &mut sink);
        assert!(!input.interact_pending());
        assert!(sink.events.is_empty());
    }

    #[test]
    fn toggle_action_switches_camera() {
        let mut s = session(InstantLoader);
        let mut input = InputState::new();
        let mut sink = RecordingSink::new();
        assert!(s.handle_action(&Action::ToggleCameraMode, &mut input, &mut sink));
        assert_eq!(s.mode(), CameraMode::Character);
        let (eye, _) = s.player().camera_pose();
        assert_eq!(s.camera().position, eye);
        assert!(!s.handle_action(&Action::ToggleInspector, &mut input, &mut sink));
        assert!(s.handle_action(&Action::Press(Control::Run), &mut input, &mut sink));
        assert!(input.run);
    }

    #[test]
    fn draw_list_includes_the_player() {
        let s = session(InstantLoader);
        let city_only = DrawList::from_city(s.city());
        assert_eq!(s.draw_list().instance_count(), city_only.instance_count() + 1);
    }

    #[test]
    fn dispose_twice_is_harmless() {
        let loader = DeferredLoader::default();
        let mut s = session(loader.clone());
        assert!(s.dispose());
        assert!(!s.dispose());
        assert!(s.city().is_disposed());

        // Late completions after disposal are ignored.
        for reply in loader.pending.borrow_mut().drain(..) {
            let path = reply.request().path().to_string();
            reply.complete(Ok(LoadedAsset::Texture(TextureAsset { path, width: 1, height: 1 })));
        }
        let mut sink = RecordingSink::new();
        let stats = s.frame(0.016, &mut InputState::new(), &mut sink);
        assert_eq!(stats, FrameStats::default());
        assert_eq!(s.click(400.0, 300.0, &mut sink), None);
        assert!(sink.events.is_empty());
        assert!(s.draw_list().is_empty());
    }

    #[test]
    fn late_texture_after_frame_still_applies() {
        let loader = DeferredLoader::default();
        let mut s = session(loader.clone());
        let mut sink = RecordingSink::new();
        s.frame(0.016, &mut InputState::new(), &mut sink);
        assert!(s.city().pending_textures() > 0);

        for reply in loader.pending.borrow_mut().drain(..) {
            let path = reply.request().path().to_string();
            let outcome = match reply.request() {
                LoadRequest::Texture { .. } => Ok(LoadedAsset::Texture(TextureAsset { path, width: 8, height: 8 })),
                LoadRequest::Model { .. } => Err(AssetLoadError::Unsupported(path)),
            };
            reply.complete(outcome);
        }
        s.frame(0.016, &mut InputState::new(), &mut sink);
        assert_eq!(s.city().pending_textures(), 0);
        assert!(s.player().avatar().is_placeholder());
    }
}
