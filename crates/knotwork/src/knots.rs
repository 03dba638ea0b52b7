//! Knot tracks for long or blocked wires.
//!
//! The planner never edits the graph. It compares the tracks it wants with the knots already
//! hanging off each output pin and emits [`KnotRequest`]s: matching structures are moved,
//! anything else on that pin is removed and recreated. Pins whose links need no knots lose
//! the knots they had. Pins with knots shared with nodes outside the formatted set are left
//! alone.

use crate::config::WiringStyle;
use crate::context::LayoutContext;
use crate::error::Result;
use crate::tree::is_exec_link;
use indexmap::{IndexMap, IndexSet};
use knotwork_graph::{
    Graph, GraphError, NodeId, PinDirection, PinId, PinLink, Rect, Vec2, align_to_grid,
};
use serde::Serialize;

/// Upper bound on how many spacing steps a track may slide down.
const MAX_TRACK_SHIFTS: usize = 40;

/// One knot of a planned track. The knot feeds `targets` and the next knot of the track.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedKnot {
    /// Top-left corner of the knot node.
    pub position: Vec2,
    pub targets: Vec<PinId>,
}

/// A chain of knots starting at `source`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnotTrack {
    pub source: PinId,
    pub knots: Vec<PlannedKnot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum KnotRequest {
    Create(KnotTrack),
    Move { knot: NodeId, position: Vec2 },
    Remove { knot: NodeId },
}

impl KnotRequest {
    pub fn translate(&mut self, delta: Vec2) {
        match self {
            Self::Create(track) => {
                for knot in &mut track.knots {
                    knot.position += delta;
                }
            }
            Self::Move { position, .. } => *position += delta,
            Self::Remove { .. } => {}
        }
    }
}

/// Performs `requests` on `graph` in order and returns the ids of the created knots.
///
/// Removing a knot links its upstream pins straight to its downstream pins again, so a
/// source can be removed and recreated within one request list.
pub fn apply_knot_requests(
    graph: &mut Graph,
    requests: &[KnotRequest],
    knot_size: Vec2,
) -> Result<Vec<NodeId>> {
    let mut created = Vec::new();
    for request in requests {
        match request {
            KnotRequest::Remove { knot } => graph.dissolve_knot(*knot)?,
            KnotRequest::Move { knot, position } => {
                if !graph.set_position(*knot, *position) {
                    return Err(GraphError::UnknownNode(*knot).into());
                }
            }
            KnotRequest::Create(track) => created.extend(create_track(graph, track, knot_size)?),
        }
    }
    Ok(created)
}

fn create_track(graph: &mut Graph, track: &KnotTrack, knot_size: Vec2) -> Result<Vec<NodeId>> {
    let category = graph
        .pin(track.source)
        .ok_or(GraphError::UnknownPin(track.source))?
        .category;
    let mut previous = track.source;
    let mut out = Vec::with_capacity(track.knots.len());
    for planned in &track.knots {
        let knot = graph.add_knot(planned.position, knot_size, category);
        graph.link(previous, Graph::knot_input(knot))?;
        for &target in &planned.targets {
            graph.unlink(track.source, target);
            graph.link(Graph::knot_output(knot), target)?;
        }
        previous = Graph::knot_output(knot);
        out.push(knot);
    }
    Ok(out)
}

/// Wires one track has to carry.
#[derive(Debug, Clone)]
struct TrackPlan {
    source: PinId,
    targets: Vec<PinId>,
    backward: bool,
}

/// Knot ids per existing track, in chain order.
type ExistingTracks = Vec<Vec<NodeId>>;

impl LayoutContext<'_> {
    pub(crate) fn plan_knots(&self) -> Vec<KnotRequest> {
        let _span = tracing::debug_span!("knots").entered();
        let formatted = self.formatted_nodes();
        let obstacles: Vec<(NodeId, Rect)> = formatted
            .iter()
            .filter_map(|n| self.graph.bounds(*n).map(|b| (*n, b)))
            .collect();

        let mut sources: IndexSet<PinId> = IndexSet::new();
        let mut wanted: IndexMap<PinId, Vec<PinLink>> = IndexMap::new();
        for &node in &formatted {
            for link in self.graph.pin_links(node, Some(PinDirection::Output)) {
                sources.insert(link.from);
                if self.needs_knots(&link, &formatted, &obstacles) {
                    wanted.entry(link.from).or_default().push(link);
                }
            }
        }

        let mut removes: Vec<KnotRequest> = Vec::new();
        let mut moves: Vec<KnotRequest> = Vec::new();
        let mut creates: Vec<KnotRequest> = Vec::new();
        let mut placed: Vec<Rect> = Vec::new();

        for source in sources {
            let Some(existing) = self.existing_tracks(source, &formatted) else {
                tracing::debug!(pin = %source, "leaving shared knots untouched");
                continue;
            };
            let planned: Vec<KnotTrack> = wanted
                .get(&source)
                .map(|links| self.group_tracks(source, links))
                .unwrap_or_default()
                .iter()
                .map(|plan| self.place_track(plan, &obstacles, &mut placed))
                .collect();

            if let Some(pairs) = self.match_tracks(&existing, &planned) {
                for (knots, track) in pairs {
                    for (knot, want) in knots.iter().zip(&track.knots) {
                        if self.graph.position(*knot) != Some(want.position) {
                            moves.push(KnotRequest::Move {
                                knot: *knot,
                                position: want.position,
                            });
                        }
                    }
                }
                continue;
            }
            for knot in existing.iter().flatten() {
                removes.push(KnotRequest::Remove { knot: *knot });
            }
            creates.extend(planned.into_iter().map(KnotRequest::Create));
        }

        tracing::debug!(
            create = creates.len(),
            moved = moves.len(),
            removed = removes.len(),
            "planned knots"
        );
        removes.extend(moves);
        removes.extend(creates);
        removes
    }

    fn needs_knots(
        &self,
        link: &PinLink,
        formatted: &IndexSet<NodeId>,
        obstacles: &[(NodeId, Rect)],
    ) -> bool {
        let (from, to) = (link.from_node(), link.to_node());
        if !formatted.contains(&to) || self.same_row.contains(link) {
            return false;
        }
        if is_exec_link(self.graph, link, self.config) {
            if !self.in_pool(from) || !self.in_pool(to) {
                return false;
            }
        } else {
            let cluster = |n: NodeId| self.parameters.owner(n).unwrap_or(n);
            if cluster(from) == cluster(to) {
                return false;
            }
        }
        let (Some(a), Some(b)) = (
            self.graph.pin_position(link.from),
            self.graph.pin_position(link.to),
        ) else {
            return false;
        };
        if a.distance(b) > self.config.knot_distance_threshold {
            return true;
        }
        obstacles
            .iter()
            .any(|(n, r)| *n != from && *n != to && r.intersects_segment(a, b))
    }

    /// Tracks hanging off `source`, or `None` when its knots do not form plain chains or
    /// reach nodes outside the formatted set.
    fn existing_tracks(
        &self,
        source: PinId,
        formatted: &IndexSet<NodeId>,
    ) -> Option<ExistingTracks> {
        let pin = self.graph.pin(source)?;
        let mut tracks = Vec::new();
        for &first in pin.links() {
            if !self.graph.kind(first.node).is_some_and(|k| k.is_knot()) {
                continue;
            }
            let mut chain = Vec::new();
            let mut cursor = Some(first.node);
            while let Some(knot) = cursor {
                if chain.contains(&knot) {
                    return None;
                }
                let inputs = self.graph.pin(Graph::knot_input(knot))?.links().len();
                if inputs != 1 {
                    return None;
                }
                if self
                    .graph
                    .knot_targets(knot)
                    .iter()
                    .any(|t| !formatted.contains(&t.node))
                {
                    return None;
                }
                chain.push(knot);
                let next: Vec<NodeId> = self
                    .graph
                    .pin(Graph::knot_output(knot))?
                    .links()
                    .iter()
                    .map(|p| p.node)
                    .filter(|n| self.graph.kind(*n).is_some_and(|k| k.is_knot()))
                    .collect();
                cursor = match next.as_slice() {
                    [] => None,
                    [only] => Some(*only),
                    _ => return None,
                };
            }
            tracks.push(chain);
        }
        Some(tracks)
    }

    /// Pairs every existing chain with a planned track of the same shape.
    fn match_tracks<'a>(
        &self,
        existing: &'a ExistingTracks,
        planned: &'a [KnotTrack],
    ) -> Option<Vec<(&'a Vec<NodeId>, &'a KnotTrack)>> {
        if existing.len() != planned.len() {
            return None;
        }
        let mut free: Vec<&KnotTrack> = planned.iter().collect();
        let mut pairs = Vec::with_capacity(existing.len());
        for chain in existing {
            let shape: Vec<Vec<PinId>> = chain
                .iter()
                .map(|k| sorted(self.graph.knot_targets(*k)))
                .collect();
            let found = free.iter().position(|track| {
                track.knots.len() == shape.len()
                    && track
                        .knots
                        .iter()
                        .zip(&shape)
                        .all(|(k, s)| sorted(k.targets.clone()) == *s)
            })?;
            pairs.push((chain, free.swap_remove(found)));
        }
        Some(pairs)
    }

    fn group_tracks(&self, source: PinId, links: &[PinLink]) -> Vec<TrackPlan> {
        let source_x = self.graph.pin_position(source).map_or(0.0, |p| p.x);
        let mut forward: Vec<PinId> = Vec::new();
        let mut plans: Vec<TrackPlan> = Vec::new();
        for link in links {
            let target_x = self.graph.pin_position(link.to).map_or(0.0, |p| p.x);
            let backward = target_x <= source_x;
            if backward || self.config.wiring_style == WiringStyle::SingleWire {
                plans.push(TrackPlan {
                    source,
                    targets: vec![link.to],
                    backward,
                });
            } else {
                forward.push(link.to);
            }
        }
        if !forward.is_empty() {
            plans.insert(
                0,
                TrackPlan {
                    source,
                    targets: forward,
                    backward: false,
                },
            );
        }
        plans
    }

    fn place_track(
        &self,
        plan: &TrackPlan,
        obstacles: &[(NodeId, Rect)],
        placed: &mut Vec<Rect>,
    ) -> KnotTrack {
        let start = self.graph.pin_position(plan.source).unwrap_or_default();
        let gap = self.config.knot_size.x;
        let spacing = self.config.knot_track_spacing;
        let mut targets: Vec<(PinId, Vec2)> = plan
            .targets
            .iter()
            .filter_map(|t| self.graph.pin_position(*t).map(|p| (*t, p)))
            .collect();
        targets.sort_by(|a, b| a.1.x.total_cmp(&b.1.x));

        let skip: Vec<NodeId> = std::iter::once(plan.source.node)
            .chain(targets.iter().map(|(t, _)| t.node))
            .collect();

        let (left, right, first_y) = if plan.backward {
            let lowest = skip
                .iter()
                .filter_map(|n| self.graph.bounds(*n))
                .map(|b| b.bottom)
                .fold(start.y, f64::max);
            let left = targets.first().map_or(start.x, |(_, p)| p.x) - gap;
            (left, start.x + gap, lowest + spacing)
        } else {
            let right = targets.last().map_or(start.x, |(_, p)| p.x) - gap;
            (start.x, right.max(start.x), start.y)
        };

        let band_at = |y: f64| Rect::new(left, y - spacing * 0.5, right, y + spacing * 0.5);
        let mut y = first_y;
        let mut shifts = 0;
        while shifts < MAX_TRACK_SHIFTS {
            let band = band_at(y);
            let blocked = obstacles
                .iter()
                .any(|(n, r)| !skip.contains(n) && r.intersects(&band))
                || placed.iter().any(|p| p.intersects(&band));
            if !blocked {
                break;
            }
            y += spacing;
            shifts += 1;
        }
        if shifts == MAX_TRACK_SHIFTS {
            tracing::warn!(pin = %plan.source, "knot track still blocked after shifting");
        }
        placed.push(band_at(y));

        let mut knots: Vec<PlannedKnot> = Vec::new();
        if plan.backward || y != start.y {
            knots.push(self.planned_knot(start.x + gap, y, Vec::new()));
        }
        for (target, position) in targets {
            let x = align_to_grid(position.x - gap);
            match knots.last_mut() {
                Some(last) if !last.targets.is_empty() && self.knot_center_x(last) == x => {
                    last.targets.push(target);
                }
                _ => knots.push(self.planned_knot(x, y, vec![target])),
            }
        }
        KnotTrack {
            source: plan.source,
            knots,
        }
    }

    fn planned_knot(&self, center_x: f64, y: f64, targets: Vec<PinId>) -> PlannedKnot {
        let size = self.config.knot_size;
        PlannedKnot {
            position: Vec2::new(align_to_grid(center_x) - size.x * 0.5, y - size.y * 0.5),
            targets,
        }
    }

    fn knot_center_x(&self, knot: &PlannedKnot) -> f64 {
        knot.position.x + self.config.knot_size.x * 0.5
    }
}

fn sorted(mut pins: Vec<PinId>) -> Vec<PinId> {
    pins.sort();
    pins
}
