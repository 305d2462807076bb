//! Roadmap graph shared by the roadmap planners, searched with Dijkstra.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;

use crate::common::Point;

#[derive(Debug, Clone, Default)]
pub struct Roadmap {
    pub nodes: Vec<Point>,
    pub edges: Vec<Vec<usize>>,
}

impl Roadmap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, p: Point) -> usize {
        self.nodes.push(p);
        self.edges.push(Vec::new());
        self.nodes.len() - 1
    }

    /// Undirected edge; duplicates are ignored.
    pub fn connect(&mut self, a: usize, b: usize) {
        if a == b || self.edges[a].contains(&b) {
            return;
        }
        self.edges[a].push(b);
        self.edges[b].push(a);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Indices of the `k` closest nodes to `p`, nearest first, `exclude` skipped.
    pub fn k_nearest(&self, p: &Point, k: usize, exclude: usize) -> Vec<(usize, f64)> {
        let mut distances: Vec<(usize, f64)> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != exclude)
            .map(|(i, q)| (i, p.distance(q)))
            .collect();
        distances.sort_by_key(|(_, d)| OrderedFloat(*d));
        distances.truncate(k);
        distances
    }

    /// All nodes within `radius` of `p`, `exclude` skipped.
    pub fn within(&self, p: &Point, radius: f64, exclude: usize) -> Vec<(usize, f64)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != exclude)
            .map(|(i, q)| (i, p.distance(q)))
            .filter(|(_, d)| *d <= radius)
            .collect()
    }

    /// Shortest node sequence from `start` to `goal`, both included.
    pub fn shortest_path(&self, start: usize, goal: usize) -> Option<Vec<usize>> {
        let n = self.nodes.len();
        let mut dist = vec![f64::INFINITY; n];
        let mut prev: Vec<Option<usize>> = vec![None; n];
        let mut open = BinaryHeap::new();

        dist[start] = 0.0;
        open.push((Reverse(OrderedFloat(0.0)), start));

        while let Some((Reverse(OrderedFloat(cost)), current)) = open.pop() {
            if current == goal {
                let mut route = vec![goal];
                let mut cursor = goal;
                while let Some(p) = prev[cursor] {
                    route.push(p);
                    cursor = p;
                }
                route.reverse();
                return Some(route);
            }
            if cost > dist[current] {
                continue;
            }
            for &next in &self.edges[current] {
                let alt = cost + self.nodes[current].distance(&self.nodes[next]);
                if alt < dist[next] {
                    dist[next] = alt;
                    prev[next] = Some(current);
                    open.push((Reverse(OrderedFloat(alt)), next));
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortest_path_prefers_cheaper_route() {
        let mut g = Roadmap::new();
        let a = g.add_node(Point::new(0.0, 0.0));
        let b = g.add_node(Point::new(5.0, 5.0));
        let c = g.add_node(Point::new(5.0, 0.5));
        let d = g.add_node(Point::new(10.0, 0.0));
        g.connect(a, b);
        g.connect(b, d);
        g.connect(a, c);
        g.connect(c, d);
        assert_eq!(g.shortest_path(a, d), Some(vec![a, c, d]));
    }

    #[test]
    fn test_disconnected() {
        let mut g = Roadmap::new();
        let a = g.add_node(Point::new(0.0, 0.0));
        let b = g.add_node(Point::new(1.0, 0.0));
        assert_eq!(g.shortest_path(a, b), None);
        assert_eq!(g.shortest_path(a, a), Some(vec![a]));
    }

    #[test]
    fn test_k_nearest() {
        let mut g = Roadmap::new();
        for x in 0..5 {
            g.add_node(Point::new(x as f64, 0.0));
        }
        let near = g.k_nearest(&Point::new(0.0, 0.0), 2, 0);
        assert_eq!(near.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![1, 2]);
    }
}
