use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use abstutil::Tags;
use geom::{Polygon, Pt2D};

use crate::osm::{self, NodeID, WayID};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    Line,
    Area,
}

impl GeometryKind {
    /// A single node is a point. A closed way is an area, unless it's a road or railway loop
    /// without `area=yes`.
    pub fn classify(nodes: &[NodeID], tags: &Tags) -> GeometryKind {
        if nodes.len() == 1 {
            return GeometryKind::Point;
        }
        let closed = nodes.len() >= 4 && nodes.first() == nodes.last();
        if !closed || tags.is(osm::AREA, "no") {
            return GeometryKind::Line;
        }
        if tags.is(osm::AREA, "yes") {
            return GeometryKind::Area;
        }
        if tags.has_any(vec![osm::HIGHWAY, osm::RAILWAY]) {
            GeometryKind::Line
        } else {
            GeometryKind::Area
        }
    }
}

/// One tagged record from the raw feed, or a fragment of one produced while splitting.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawElement {
    pub id: WayID,
    pub kind: GeometryKind,
    pub nodes: Vec<NodeID>,
    pub tags: Tags,
    /// Set once the element has been converted into something else.
    pub used: bool,
    // Filled in from the node table on first use
    pts: Option<Vec<Pt2D>>,
}

impl RawElement {
    pub fn new(id: WayID, nodes: Vec<NodeID>, tags: Tags) -> RawElement {
        let kind = GeometryKind::classify(&nodes, &tags);
        RawElement {
            id,
            kind,
            nodes,
            tags,
            used: false,
            pts: None,
        }
    }

    /// A fragment whose points are already known, like one handed over from another tile.
    pub fn with_points(
        id: WayID,
        kind: GeometryKind,
        nodes: Vec<NodeID>,
        pts: Vec<Pt2D>,
        tags: Tags,
    ) -> RawElement {
        RawElement {
            id,
            kind,
            nodes,
            tags,
            used: false,
            pts: Some(pts),
        }
    }

    /// The points, if they've been resolved yet.
    pub fn resolved_points(&self) -> Option<&Vec<Pt2D>> {
        self.pts.as_ref()
    }

    pub fn first_node(&self) -> NodeID {
        self.nodes[0]
    }

    pub fn last_node(&self) -> NodeID {
        *self.nodes.last().unwrap()
    }

    /// Where this element is for the purpose of tile assignment: the centroid of an area, the
    /// middle point of anything else.
    pub fn anchor(&self) -> Option<Pt2D> {
        let pts = self.pts.as_ref()?;
        match self.kind {
            GeometryKind::Area => Polygon::new(pts.clone())
                .map(|poly| poly.center())
                .ok()
                .or_else(|| Some(Pt2D::center(pts))),
            _ => Some(pts[pts.len() / 2]),
        }
    }
}

/// The raw input for one tile: node positions and the elements referencing them.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ElementStore {
    #[serde(
        serialize_with = "abstutil::serialize_btreemap",
        deserialize_with = "abstutil::deserialize_btreemap"
    )]
    nodes: BTreeMap<NodeID, Pt2D>,
    elements: Vec<RawElement>,
}

impl ElementStore {
    pub fn new() -> ElementStore {
        ElementStore::default()
    }

    pub fn add_node(&mut self, id: NodeID, pt: Pt2D) {
        self.nodes.insert(id, pt);
    }

    pub fn node_pt(&self, id: NodeID) -> Option<Pt2D> {
        self.nodes.get(&id).cloned()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Adds a way referencing nodes already in the table. Returns its index.
    pub fn add_way(&mut self, id: WayID, nodes: Vec<NodeID>, tags: Tags) -> usize {
        self.elements.push(RawElement::new(id, nodes, tags));
        self.elements.len() - 1
    }

    /// Adds an element, remembering the positions of any nodes it already resolved.
    pub fn add_element(&mut self, element: RawElement) -> usize {
        if let Some(pts) = element.resolved_points() {
            for (node, pt) in element.nodes.iter().zip(pts.iter()) {
                self.nodes.entry(*node).or_insert(*pt);
            }
        }
        self.elements.push(element);
        self.elements.len() - 1
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, idx: usize) -> &RawElement {
        &self.elements[idx]
    }

    pub fn elements(&self) -> &Vec<RawElement> {
        &self.elements
    }

    /// Looks up the element's points from the node table the first time they're needed.
    pub fn resolve(&mut self, idx: usize) -> Result<&Vec<Pt2D>> {
        let element = &mut self.elements[idx];
        let pts = match element.pts.take() {
            Some(pts) => pts,
            None => {
                let mut pts = Vec::with_capacity(element.nodes.len());
                for node in &element.nodes {
                    match self.nodes.get(node) {
                        Some(pt) => pts.push(*pt),
                        None => bail!("{} references {}, which has no position", element.id, node),
                    }
                }
                pts
            }
        };
        Ok(element.pts.insert(pts))
    }

    pub fn mark_used(&mut self, idx: usize) {
        self.elements[idx].used = true;
    }

    /// Indices of everything not yet converted.
    pub fn unused(&self) -> Vec<usize> {
        (0..self.elements.len())
            .filter(|idx| !self.elements[*idx].used)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: Vec<(&str, &str)>) -> Tags {
        pairs.into_iter().collect()
    }

    #[test]
    fn classify_geometry() {
        let closed = vec![NodeID(1), NodeID(2), NodeID(3), NodeID(1)];
        assert_eq!(
            GeometryKind::classify(&[NodeID(1)], &Tags::empty()),
            GeometryKind::Point
        );
        assert_eq!(
            GeometryKind::classify(&closed, &tags(vec![("building", "yes")])),
            GeometryKind::Area
        );
        assert_eq!(
            GeometryKind::classify(&closed, &tags(vec![("highway", "residential")])),
            GeometryKind::Line
        );
        assert_eq!(
            GeometryKind::classify(
                &closed,
                &tags(vec![("highway", "pedestrian"), ("area", "yes")])
            ),
            GeometryKind::Area
        );
        assert_eq!(
            GeometryKind::classify(&closed[0..3], &Tags::empty()),
            GeometryKind::Line
        );
    }

    #[test]
    fn lazy_resolution() {
        let mut store = ElementStore::new();
        store.add_node(NodeID(1), Pt2D::new(0.0, 0.0));
        store.add_node(NodeID(2), Pt2D::new(5.0, 0.0));
        let good = store.add_way(WayID(10), vec![NodeID(1), NodeID(2)], Tags::empty());
        let bad = store.add_way(WayID(11), vec![NodeID(1), NodeID(3)], Tags::empty());

        assert!(store.get(good).resolved_points().is_none());
        assert_eq!(store.resolve(good).unwrap().len(), 2);
        assert!(store.get(good).resolved_points().is_some());
        assert!(store.resolve(bad).is_err());

        store.mark_used(good);
        assert_eq!(store.unused(), vec![bad]);
    }

    #[test]
    fn fragments_bring_their_nodes() {
        let mut store = ElementStore::new();
        store.add_element(RawElement::with_points(
            WayID(1),
            GeometryKind::Line,
            vec![NodeID(7), NodeID(8)],
            vec![Pt2D::new(1.0, 1.0), Pt2D::new(2.0, 2.0)],
            Tags::empty(),
        ));
        assert_eq!(store.node_pt(NodeID(8)), Some(Pt2D::new(2.0, 2.0)));
        assert_eq!(store.num_nodes(), 2);
    }
}
