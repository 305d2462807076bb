//! Flat per-strategy option mapping.
//!
//! Every strategy reads its own keys through [`Options`] and finishes with
//! [`Options::finish`], which rejects keys nobody asked for. That keeps a typo
//! in the parameter file a startup error instead of a silently ignored value.

use std::cell::RefCell;
use std::collections::BTreeSet;

use toml::{Table, Value};

use crate::common::{AreaBounds, ConfigError, Point, Polygon};

#[derive(Debug, Clone)]
pub struct Options {
    strategy: String,
    table: Table,
    used: RefCell<BTreeSet<String>>,
}

impl Options {
    pub fn new(strategy: &str, table: Table) -> Self {
        Self {
            strategy: strategy.to_string(),
            table,
            used: RefCell::new(BTreeSet::new()),
        }
    }

    pub fn empty(strategy: &str) -> Self {
        Self::new(strategy, Table::new())
    }

    /// Parse an inline TOML table, mostly useful in tests.
    pub fn parse(strategy: &str, source: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(strategy, toml::from_str(source)?))
    }

    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.used.borrow_mut().insert(key.to_string());
        self.table.get(key)
    }

    fn invalid(&self, key: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidOption {
            strategy: self.strategy.clone(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    fn missing(&self, key: &str) -> ConfigError {
        ConfigError::MissingOption {
            strategy: self.strategy.clone(),
            key: key.to_string(),
        }
    }

    fn as_f64(&self, key: &str, value: &Value) -> Result<f64, ConfigError> {
        let v = match value {
            Value::Float(f) => *f,
            Value::Integer(i) => *i as f64,
            other => return Err(self.invalid(key, format!("expected a number, got {}", other.type_str()))),
        };
        if !v.is_finite() {
            return Err(self.invalid(key, "must be finite"));
        }
        Ok(v)
    }

    pub fn opt_f64(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        self.get(key).map(|v| self.as_f64(key, v)).transpose()
    }

    pub fn f64(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        Ok(self.opt_f64(key)?.unwrap_or(default))
    }

    pub fn require_f64(&self, key: &str) -> Result<f64, ConfigError> {
        self.opt_f64(key)?.ok_or_else(|| self.missing(key))
    }

    /// Like [`Options::f64`] but rejects values `<= 0`.
    pub fn positive_f64(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        let v = self.f64(key, default)?;
        if v <= 0.0 {
            return Err(self.invalid(key, format!("must be > 0, got {}", v)));
        }
        Ok(v)
    }

    pub fn usize(&self, key: &str, default: usize) -> Result<usize, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(Value::Integer(i)) if *i >= 0 => Ok(*i as usize),
            Some(other) => Err(self.invalid(key, format!("expected a non-negative integer, got {}", other))),
        }
    }

    pub fn bool(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(Value::Boolean(b)) => Ok(*b),
            Some(other) => Err(self.invalid(key, format!("expected a boolean, got {}", other.type_str()))),
        }
    }

    /// Percentage in [0, 100].
    pub fn percent(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        let v = self.f64(key, default)?;
        if !(0.0..=100.0).contains(&v) {
            return Err(self.invalid(key, format!("must be within [0, 100], got {}", v)));
        }
        Ok(v)
    }

    /// `min_x`, `max_x`, `min_y`, `max_y`, all required.
    pub fn require_bounds(&self) -> Result<AreaBounds, ConfigError> {
        let bounds = AreaBounds::new(
            self.require_f64("min_x")?,
            self.require_f64("max_x")?,
            self.require_f64("min_y")?,
            self.require_f64("max_y")?,
        );
        if !bounds.is_valid() {
            return Err(self.invalid("min_x", format!("empty area {:?}", bounds)));
        }
        Ok(bounds)
    }

    /// Bounds are either fully given or absent.
    pub fn opt_bounds(&self) -> Result<Option<AreaBounds>, ConfigError> {
        let keys = ["min_x", "max_x", "min_y", "max_y"];
        let present = keys.iter().filter(|k| self.table.contains_key(**k)).count();
        match present {
            0 => {
                for k in keys {
                    self.used.borrow_mut().insert(k.to_string());
                }
                Ok(None)
            }
            4 => self.require_bounds().map(Some),
            _ => Err(self.invalid("min_x", "bounds need all of min_x, max_x, min_y, max_y")),
        }
    }

    /// Array of polygons, each an array of `[x, y]` pairs.
    pub fn polygons(&self, key: &str) -> Result<Option<Vec<Polygon>>, ConfigError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let polys = value
            .as_array()
            .ok_or_else(|| self.invalid(key, "expected an array of polygons"))?;
        let mut out = Vec::with_capacity(polys.len());
        for poly in polys {
            let vertices = poly
                .as_array()
                .ok_or_else(|| self.invalid(key, "polygon must be an array of [x, y] pairs"))?
                .iter()
                .map(|v| self.point(key, v))
                .collect::<Result<Vec<_>, _>>()?;
            let polygon = Polygon::new(vertices);
            polygon.validate().map_err(|e| self.invalid(key, e.to_string()))?;
            out.push(polygon);
        }
        Ok(Some(out))
    }

    fn point(&self, key: &str, value: &Value) -> Result<Point, ConfigError> {
        match value.as_array().map(|a| a.as_slice()) {
            Some([x, y]) => Ok(Point::new(self.as_f64(key, x)?, self.as_f64(key, y)?)),
            Some([x, y, z]) => Ok(Point::new_3d(
                self.as_f64(key, x)?,
                self.as_f64(key, y)?,
                self.as_f64(key, z)?,
            )),
            _ => Err(self.invalid(key, format!("expected [x, y] or [x, y, z], got {}", value))),
        }
    }

    /// Fail on keys no reader asked for.
    pub fn finish(self) -> Result<(), ConfigError> {
        let used = self.used.into_inner();
        let unknown: Vec<String> = self.table.keys().filter(|k| !used.contains(*k)).cloned().collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::UnknownOptions {
                strategy: self.strategy,
                keys: unknown,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let opts = Options::parse("RRT", "expand_dis = 2\nmax_iter = 100\nflag = true").unwrap();
        assert_eq!(opts.f64("expand_dis", 1.0).unwrap(), 2.0);
        assert_eq!(opts.usize("max_iter", 10).unwrap(), 100);
        assert!(opts.bool("flag", false).unwrap());
        assert_eq!(opts.f64("missing", 0.5).unwrap(), 0.5);
        assert!(opts.finish().is_ok());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let opts = Options::parse("RRT", "expand_dis = 2.0\nexpnd_dis = 3.0").unwrap();
        let _ = opts.f64("expand_dis", 1.0).unwrap();
        match opts.finish() {
            Err(ConfigError::UnknownOptions { keys, .. }) => assert_eq!(keys, vec!["expnd_dis".to_string()]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_and_invalid() {
        let opts = Options::parse("ScanEnv", "min_x = \"a\"").unwrap();
        assert!(matches!(opts.require_f64("max_x"), Err(ConfigError::MissingOption { .. })));
        assert!(matches!(opts.require_f64("min_x"), Err(ConfigError::InvalidOption { .. })));
        assert!(matches!(opts.positive_f64("resolution", -1.0), Err(ConfigError::InvalidOption { .. })));
    }

    #[test]
    fn test_polygons() {
        let opts = Options::parse("PolygonEnv", "obstacles = [[[0, 0], [1, 0], [1, 1]]]").unwrap();
        let polys = opts.polygons("obstacles").unwrap().unwrap();
        assert_eq!(polys.len(), 1);
        assert_eq!(polys[0].vertices[2], Point::new(1.0, 1.0));

        let bad = Options::parse("PolygonEnv", "obstacles = [[[0, 0], [1, 0]]]").unwrap();
        assert!(bad.polygons("obstacles").is_err());
    }

    #[test]
    fn test_partial_bounds_rejected() {
        let opts = Options::parse("PolygonEnv", "min_x = 0.0\nmax_x = 1.0").unwrap();
        assert!(opts.opt_bounds().is_err());
        let none = Options::empty("PolygonEnv");
        assert_eq!(none.opt_bounds().unwrap(), None);
    }
}
