//! Search tree shared by the tree-growing planners.

use crate::common::Point;

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub point: Point,
    /// Path length from the root
    pub cost: f64,
    pub parent: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    pub fn new(root: Point) -> Self {
        Tree {
            nodes: vec![TreeNode { point: root, cost: 0.0, parent: None }],
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn point(&self, index: usize) -> &Point {
        &self.nodes[index].point
    }

    pub fn nearest(&self, p: &Point) -> usize {
        let mut min_dist = f64::INFINITY;
        let mut min_ind = 0;
        for (i, node) in self.nodes.iter().enumerate() {
            let d = node.point.distance(p);
            if d < min_dist {
                min_dist = d;
                min_ind = i;
            }
        }
        min_ind
    }

    pub fn near(&self, p: &Point, radius: f64) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.point.distance(p) <= radius)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn push(&mut self, point: Point, parent: usize) -> usize {
        let cost = self.nodes[parent].cost + self.nodes[parent].point.distance(&point);
        self.nodes.push(TreeNode { point, cost, parent: Some(parent) });
        self.nodes.len() - 1
    }

    /// Re-hang `index` under `parent` and refresh the costs of its subtree.
    pub fn reparent(&mut self, index: usize, parent: usize) {
        self.nodes[index].parent = Some(parent);
        self.nodes[index].cost = self.nodes[parent].cost + self.nodes[parent].point.distance(&self.nodes[index].point);

        let mut stack = vec![index];
        while let Some(i) = stack.pop() {
            for j in 0..self.nodes.len() {
                if self.nodes[j].parent == Some(i) {
                    self.nodes[j].cost = self.nodes[i].cost + self.nodes[i].point.distance(&self.nodes[j].point);
                    stack.push(j);
                }
            }
        }
    }

    /// Points from the root's first child down to `index`. The root itself is left out.
    pub fn branch(&self, index: usize) -> Vec<Point> {
        let mut points = Vec::new();
        let mut cursor = index;
        while let Some(parent) = self.nodes[cursor].parent {
            points.push(self.nodes[cursor].point);
            cursor = parent;
        }
        points.reverse();
        points
    }
}

/// Move from `from` towards `to` by at most `extend_length`, in steps of
/// `path_resolution`. Snaps onto `to` when the remainder is below one step.
pub fn steer(from: &Point, to: &Point, extend_length: f64, path_resolution: f64) -> Point {
    let d = from.distance(to);
    let theta = from.angle_to(to);
    let n_expand = (extend_length.min(d) / path_resolution).floor();
    let new = Point::new(
        from.x + n_expand * path_resolution * theta.cos(),
        from.y + n_expand * path_resolution * theta.sin(),
    );
    if new.distance(to) <= path_resolution {
        *to
    } else {
        new
    }
}
