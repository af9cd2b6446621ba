use geom::Pt2D;

use crate::element::{GeometryKind, RawElement};
use crate::lanes;
use crate::pipeline::{Stage, StageContext};
use crate::tile::Tile;
use crate::types::TileCoord;

/// Cuts every element where it crosses the tile's edge. Pieces inside are kept; pieces outside
/// are handed to the tile they're in, unless that tile has already finished this stage.
/// Returns true when everything has been handled.
pub fn step(tile: &mut Tile, ctx: &mut StageContext) -> bool {
    ctx.timer.start("boundary split");

    // Fragments handed over by other tiles come first, so the earliest owner wins any tie
    while let Some(idx) = tile.inbox.front().cloned() {
        if !ctx.budget.keep_going() {
            ctx.timer.stop("boundary split");
            return false;
        }
        tile.inbox.pop_front();
        split_element(tile, idx, ctx);
    }

    while tile.progress.cursor < tile.elements.len() {
        let idx = tile.progress.cursor;
        if tile.elements.get(idx).used {
            tile.progress.cursor += 1;
            continue;
        }
        if !ctx.budget.keep_going() {
            ctx.timer.stop("boundary split");
            return false;
        }
        tile.progress.cursor += 1;
        split_element(tile, idx, ctx);
    }

    debug!(
        "{} keeps {} fragments, {} split points",
        tile.coord,
        tile.fragments.len(),
        tile.split_points.len()
    );
    ctx.timer.stop("boundary split");
    true
}

fn split_element(tile: &mut Tile, idx: usize, ctx: &mut StageContext) {
    let pts = match tile.elements.resolve(idx) {
        Ok(pts) => pts.clone(),
        Err(err) => {
            ctx.timer.warn(format!("{}: skipping {}", tile.coord, err));
            tile.elements.mark_used(idx);
            return;
        }
    };
    tile.elements.mark_used(idx);
    let element = tile.elements.get(idx).clone();

    if element.kind == GeometryKind::Line && pts.len() < 2 {
        ctx.timer.warn(format!(
            "{}: skipping {}, a line with {} points",
            tile.coord,
            element.id,
            pts.len()
        ));
        return;
    }

    // Points and areas are never cut, just assigned by where they are
    if element.kind != GeometryKind::Line {
        let whole = RawElement::with_points(
            element.id,
            element.kind,
            element.nodes,
            pts,
            element.tags,
        );
        let anchor = match whole.anchor() {
            Some(pt) => pt,
            None => {
                return;
            }
        };
        let dest = ctx.registry.coord_containing(anchor);
        if dest == tile.coord {
            keep(tile, whole);
        } else {
            hand_over(tile, whole, dest, ctx);
        }
        return;
    }

    let inside: Vec<bool> = pts.iter().map(|pt| tile.owns(*pt)).collect();
    let mut start = 0;
    for i in 1..pts.len() {
        if inside[i] != inside[i - 1] {
            // Both pieces share the node where the flag changes
            emit(tile, &element, &pts, start, i, inside[start], ctx);
            tile.split_points.insert(element.nodes[i], pts[i]);
            start = i;
        }
    }
    emit(tile, &element, &pts, start, pts.len() - 1, inside[start], ctx);
}

/// Handles the inclusive range [start, end] of an element's points.
fn emit(
    tile: &mut Tile,
    element: &RawElement,
    pts: &[Pt2D],
    start: usize,
    end: usize,
    inside: bool,
    ctx: &mut StageContext,
) {
    if end <= start {
        return;
    }
    let fragment = RawElement::with_points(
        element.id,
        GeometryKind::Line,
        element.nodes[start..=end].to_vec(),
        pts[start..=end].to_vec(),
        element.tags.clone(),
    );
    if inside {
        keep(tile, fragment);
        return;
    }
    // Only the last point of a range can be on the other side of the edge, so this is always
    // outside.
    let middle = pts[start + (end - start) / 2];
    let dest = ctx.registry.coord_containing(middle);
    hand_over(tile, fragment, dest, ctx);
}

fn keep(tile: &mut Tile, fragment: RawElement) {
    let key = (fragment.id, fragment.first_node(), fragment.last_node());
    if !tile.fragment_keys.insert(key) {
        debug!(
            "{} already has the piece of {} from {} to {}",
            tile.coord, key.0, key.1, key.2
        );
        return;
    }
    for node in &fragment.nodes {
        tile.claimed.insert(fragment.id, *node);
    }
    tile.fragments.push(fragment);
}

fn hand_over(tile: &mut Tile, fragment: RawElement, dest: TileCoord, ctx: &mut StageContext) {
    if !ctx.registry.in_world(dest) {
        // Nobody else will ever take it
        keep(tile, fragment);
        return;
    }

    match ctx.registry.get(dest) {
        Some(neighbor) if neighbor.stage() > Stage::BoundarySplit => {
            let claimed = neighbor.claimed.get(fragment.id);
            let pts = fragment.resolved_points().cloned().unwrap_or_default();
            let already_claimed = fragment
                .nodes
                .iter()
                .zip(pts.iter())
                .any(|(node, pt)| neighbor.owns(*pt) && claimed.contains(node));
            if already_claimed {
                debug!(
                    "{} already claimed part of {}; dropping our piece",
                    dest, fragment.id
                );
            } else {
                keep(tile, fragment);
            }
        }
        _ => {
            for dummy in lanes::stage::provisional_for(&fragment, ctx.cfg) {
                ctx.outbox.send_dummy(dest, dummy);
            }
            ctx.outbox.send_element(dest, fragment);
        }
    }
}
