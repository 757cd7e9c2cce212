//! Incremental force-directed layout with an alpha cooling schedule.
//!
//! Each step applies link, charge, collision and centering forces in that
//! order, then integrates velocities with decay. The simulation stops when
//! alpha falls below `alpha_min` or when the settle timer expires, whichever
//! comes first.

use nodeweave_core::{EdgeId, NodeId, Vec2};
use nodeweave_events::{Event, EventBus};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::model::GraphModel;
use crate::settings::LayoutConfig;

const GOLDEN_ANGLE: f32 = 2.399_963;
const JIGGLE: f32 = 1e-3;
const COINCIDENT_SQ: f32 = 1e-9;

/// Tiny deterministic offset for coincident particles.
fn jiggle(i: usize, j: usize) -> Vec2 {
    let angle = (i * 31 + j) as f32 * GOLDEN_ANGLE;
    Vec2::new(angle.cos(), angle.sin()) * JIGGLE
}

#[derive(Debug, Clone)]
pub struct Particle {
    pub id: NodeId,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Fixed position; pinned particles ignore forces.
    pub pinned: Option<Vec2>,
    pub size: Vec2,
    /// Collision radius: half the box diagonal plus padding.
    pub radius: f32,
}

#[derive(Debug, Clone)]
pub struct Spring {
    pub edge_id: EdgeId,
    pub source: usize,
    pub target: usize,
    pub distance: f32,
    pub strength: f32,
    /// Share of the correction applied to the target, by relative degree.
    bias: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringInfo {
    pub strength: f32,
    pub distance: f32,
}

pub struct ForceLayout {
    config: LayoutConfig,
    particles: Vec<Particle>,
    index: HashMap<NodeId, usize>,
    springs: Vec<Spring>,
    alpha: f32,
    alpha_target: f32,
    running: bool,
    settle_deadline: Option<Instant>,
    focused: Option<NodeId>,
    dragging: Option<NodeId>,
    events: EventBus,
    disposed: bool,
}

impl ForceLayout {
    pub fn new(config: LayoutConfig, events: EventBus) -> Self {
        Self {
            alpha: config.initial_alpha,
            config,
            particles: Vec::new(),
            index: HashMap::new(),
            springs: Vec::new(),
            alpha_target: 0.0,
            running: false,
            settle_deadline: None,
            focused: None,
            dragging: None,
            events,
            disposed: false,
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn settle_deadline(&self) -> Option<Instant> {
        self.settle_deadline
    }

    pub fn focused(&self) -> Option<&NodeId> {
        self.focused.as_ref()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particle(&self, id: &NodeId) -> Option<&Particle> {
        self.index.get(id).map(|&i| &self.particles[i])
    }

    pub fn spring(&self, edge_id: &EdgeId) -> Option<SpringInfo> {
        self.springs
            .iter()
            .find(|spring| &spring.edge_id == edge_id)
            .map(|spring| SpringInfo {
                strength: spring.strength,
                distance: spring.distance,
            })
    }

    /// Rebuild particles and springs from the model. Velocities and pins
    /// carry over for nodes that still exist.
    pub fn update(&mut self, model: &GraphModel) {
        if self.disposed {
            return;
        }
        let previous: HashMap<NodeId, (Vec2, Option<Vec2>)> = self
            .particles
            .drain(..)
            .map(|p| (p.id, (p.velocity, p.pinned)))
            .collect();

        let padding = self.config.collision_padding;
        self.particles = model
            .nodes()
            .map(|node| {
                let (velocity, pinned) = previous
                    .get(&node.id)
                    .copied()
                    .unwrap_or((Vec2::ZERO, None));
                let half = node.size() * 0.5;
                Particle {
                    id: node.id.clone(),
                    position: pinned.unwrap_or(node.center()),
                    velocity,
                    pinned,
                    size: node.size(),
                    radius: half.length() + padding,
                }
            })
            .collect();
        self.index = self
            .particles
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();

        let mut degree = vec![0usize; self.particles.len()];
        let mut springs = Vec::with_capacity(model.edge_count());
        for edge in model.edges() {
            let (Some(&source), Some(&target)) =
                (self.index.get(&edge.source_id), self.index.get(&edge.target_id))
            else {
                continue;
            };
            degree[source] += 1;
            degree[target] += 1;
            springs.push(Spring {
                edge_id: edge.id.clone(),
                source,
                target,
                distance: self.config.link_distance,
                strength: self.config.link_strength,
                bias: 0.5,
            });
        }
        for spring in &mut springs {
            let (s, t) = (degree[spring.source] as f32, degree[spring.target] as f32);
            spring.bias = s / (s + t);
        }
        self.springs = springs;

        if self.focused.as_ref().is_some_and(|id| !self.index.contains_key(id)) {
            self.focused = None;
        }
        if self.dragging.as_ref().is_some_and(|id| !self.index.contains_key(id)) {
            self.dragging = None;
            self.alpha_target = 0.0;
        }
        self.apply_focus();
        tracing::trace!(
            particles = self.particles.len(),
            springs = self.springs.len(),
            "layout rebuilt"
        );
    }

    fn apply_focus(&mut self) {
        let cfg = &self.config;
        for spring in &mut self.springs {
            let incident = self.focused.as_ref().is_some_and(|id| {
                self.particles[spring.source].id == *id || self.particles[spring.target].id == *id
            });
            if incident {
                spring.strength = cfg.focus_link_strength;
                spring.distance = cfg.focus_link_distance;
            } else {
                spring.strength = cfg.link_strength;
                spring.distance = cfg.link_distance;
            }
        }
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    fn arm(&mut self, now: Instant) {
        self.settle_deadline = Some(now + Duration::from_millis(self.config.settle_time_limit_ms));
    }

    pub fn reheat(&mut self) {
        self.reheat_at(Instant::now());
    }

    /// Raise alpha to the reheat level and restart the settle timer.
    pub fn reheat_at(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        self.alpha = self.config.reheat_alpha;
        self.running = true;
        self.arm(now);
    }

    pub fn restart(&mut self) {
        self.restart_at(Instant::now());
    }

    /// Full-strength run, used after loading a document.
    pub fn restart_at(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        self.alpha = self.config.initial_alpha;
        self.running = true;
        self.arm(now);
    }

    /// Idempotent.
    pub fn stop(&mut self) {
        if self.running {
            self.settle(false);
        }
    }

    fn settle(&mut self, timed_out: bool) {
        self.running = false;
        self.settle_deadline = None;
        tracing::debug!(alpha = self.alpha, timed_out, "layout settled");
        self.events.publish(Event::LayoutSettled { timed_out });
    }

    /// Release everything. Later calls are no-ops.
    pub fn dispose(&mut self) {
        self.running = false;
        self.settle_deadline = None;
        self.particles.clear();
        self.springs.clear();
        self.index.clear();
        self.focused = None;
        self.dragging = None;
        self.disposed = true;
    }

    pub fn tick(&mut self, model: &mut GraphModel) -> bool {
        self.tick_at(model, Instant::now())
    }

    /// Advance one step and write positions back. Returns `false` once stopped.
    pub fn tick_at(&mut self, model: &mut GraphModel, now: Instant) -> bool {
        if self.disposed || !self.running {
            return false;
        }
        if self.settle_deadline.is_some_and(|deadline| now >= deadline) {
            self.settle(true);
            return false;
        }

        self.step();
        model.apply_layout_positions(self.particles.iter().map(|p| (&p.id, p.position)));
        self.events.publish(Event::LayoutTick { alpha: self.alpha });

        if self.alpha < self.config.alpha_min && self.dragging.is_none() {
            self.settle(false);
        }
        true
    }

    // ------------------------------------------------------------------
    // Interaction
    // ------------------------------------------------------------------

    pub fn fix_node(&mut self, id: &NodeId, pos: Vec2) -> bool {
        let Some(&i) = self.index.get(id) else {
            return false;
        };
        let particle = &mut self.particles[i];
        particle.pinned = Some(pos);
        particle.position = pos;
        particle.velocity = Vec2::ZERO;
        true
    }

    pub fn release_node(&mut self, id: &NodeId) -> bool {
        let Some(&i) = self.index.get(id) else {
            return false;
        };
        self.particles[i].pinned = None;
        true
    }

    pub fn start_drag(&mut self, id: &NodeId) -> bool {
        self.start_drag_at(id, Instant::now())
    }

    /// Pin the node where it is and keep the simulation warm while dragging.
    pub fn start_drag_at(&mut self, id: &NodeId, now: Instant) -> bool {
        let Some(pos) = self.particle(id).map(|p| p.position) else {
            return false;
        };
        self.fix_node(id, pos);
        self.dragging = Some(id.clone());
        self.alpha_target = self.config.drag_alpha_target;
        self.running = true;
        self.arm(now);
        true
    }

    pub fn drag_to(&mut self, id: &NodeId, pos: Vec2) -> bool {
        if self.dragging.as_ref() != Some(id) || !pos.is_finite() {
            return false;
        }
        self.fix_node(id, pos)
    }

    pub fn end_drag(&mut self, id: &NodeId) -> bool {
        self.end_drag_at(id, Instant::now())
    }

    /// Unpin and let the graph cool down within one fresh settle window.
    pub fn end_drag_at(&mut self, id: &NodeId, now: Instant) -> bool {
        if self.dragging.as_ref() != Some(id) {
            return false;
        }
        self.release_node(id);
        self.dragging = None;
        self.alpha_target = 0.0;
        if self.running {
            self.arm(now);
        }
        true
    }

    /// Tighten springs incident to `id` and reheat.
    pub fn focus_node(&mut self, id: &NodeId) -> bool {
        if !self.index.contains_key(id) {
            return false;
        }
        self.focused = Some(id.clone());
        self.apply_focus();
        self.reheat();
        true
    }

    pub fn clear_focus(&mut self) {
        if self.focused.take().is_some() {
            self.apply_focus();
            self.reheat();
        }
    }

    pub fn set_center(&mut self, center: Vec2) {
        if center.is_finite() {
            self.config.center = center;
        }
    }

    // ------------------------------------------------------------------
    // Simulation
    // ------------------------------------------------------------------

    /// One integration step without timer checks or model write-back.
    pub fn step(&mut self) {
        self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;
        self.apply_links();
        self.apply_charge();
        self.apply_collision();
        self.apply_center();
        self.integrate();
    }

    fn apply_links(&mut self) {
        for spring in &self.springs {
            let s = &self.particles[spring.source];
            let t = &self.particles[spring.target];
            let mut delta = (t.position + t.velocity) - (s.position + s.velocity);
            if delta.length_sq() < COINCIDENT_SQ {
                delta = jiggle(spring.source, spring.target);
            }
            let length = delta.length();
            let k = (length - spring.distance) / length * self.alpha * spring.strength;
            let correction = delta * k;
            self.particles[spring.target].velocity -= correction * spring.bias;
            self.particles[spring.source].velocity += correction * (1.0 - spring.bias);
        }
    }

    fn apply_charge(&mut self) {
        let strength = self.config.charge_strength * self.alpha;
        let max_sq = self.config.charge_max_distance * self.config.charge_max_distance;
        let n = self.particles.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let mut delta = self.particles[j].position - self.particles[i].position;
                let mut dist_sq = delta.length_sq();
                if dist_sq >= max_sq {
                    continue;
                }
                if dist_sq < COINCIDENT_SQ {
                    delta = jiggle(i, j);
                    dist_sq = delta.length_sq();
                }
                let w = strength / dist_sq.max(1.0);
                self.particles[i].velocity += delta * w;
                self.particles[j].velocity -= delta * w;
            }
        }
    }

    fn apply_collision(&mut self) {
        let strength = self.config.collision_strength;
        let n = self.particles.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = (&self.particles[i], &self.particles[j]);
                let reach = a.radius + b.radius;
                let mut delta = (a.position + a.velocity) - (b.position + b.velocity);
                let mut dist_sq = delta.length_sq();
                if dist_sq >= reach * reach {
                    continue;
                }
                if dist_sq < COINCIDENT_SQ {
                    delta = jiggle(i, j);
                    dist_sq = delta.length_sq();
                }
                let dist = dist_sq.sqrt();
                let push = delta * ((reach - dist) / dist * strength);
                let (ra, rb) = (a.radius * a.radius, b.radius * b.radius);
                let ratio = rb / (ra + rb);
                self.particles[i].velocity += push * ratio;
                self.particles[j].velocity -= push * (1.0 - ratio);
            }
        }
    }

    fn apply_center(&mut self) {
        let pull = self.config.center_strength * self.alpha;
        let center = self.config.center;
        for particle in &mut self.particles {
            particle.velocity += (center - particle.position) * pull;
        }
    }

    fn integrate(&mut self) {
        let keep = 1.0 - self.config.velocity_decay;
        let max_velocity = self.config.max_velocity;
        for particle in &mut self.particles {
            if let Some(pin) = particle.pinned {
                particle.position = pin;
                particle.velocity = Vec2::ZERO;
                continue;
            }
            particle.velocity *= keep;
            if particle.velocity.length() > max_velocity {
                particle.velocity = particle.velocity.normalized() * max_velocity;
            }
            let next = particle.position + particle.velocity;
            if next.is_finite() {
                particle.position = next;
            } else {
                tracing::warn!(id = %particle.id, "non-finite layout step discarded");
                particle.velocity = Vec2::ZERO;
            }
        }
    }
}
