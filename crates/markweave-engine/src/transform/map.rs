/// Which side a mapped position sticks to when content is inserted exactly
/// at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Before,
    After,
}

/// Result of mapping a position through a step: the new position, and
/// whether the content the position pointed into was deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapResult {
    pub pos: usize,
    pub deleted: bool,
}

/// The position adjustments made by a single step, as a sorted list of
/// `(start, old_size, new_size)` replaced ranges.
#[derive(Debug, Clone, Default)]
pub struct StepMap {
    ranges: Vec<(usize, usize, usize)>,
}

impl StepMap {
    pub fn identity() -> Self {
        StepMap { ranges: Vec::new() }
    }

    pub fn new(ranges: Vec<(usize, usize, usize)>) -> Self {
        StepMap { ranges }
    }

    pub fn single(start: usize, old_size: usize, new_size: usize) -> Self {
        StepMap {
            ranges: vec![(start, old_size, new_size)],
        }
    }

    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        self.map_result(pos, assoc).pos
    }

    pub fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult {
        let mut diff: i64 = 0;
        for &(start, old_size, new_size) in &self.ranges {
            if start > pos {
                break;
            }
            let end = start + old_size;
            if pos <= end {
                // Positions on a range edge stick to the surviving side;
                // interior positions collapse toward the chosen association.
                let side = if old_size == 0 {
                    assoc
                } else if pos == start {
                    Assoc::Before
                } else if pos == end {
                    Assoc::After
                } else {
                    assoc
                };
                let base = start as i64 + diff;
                let mapped = match side {
                    Assoc::Before => base,
                    Assoc::After => base + new_size as i64,
                };
                return MapResult {
                    pos: mapped as usize,
                    deleted: pos > start && pos < end,
                };
            }
            diff += new_size as i64 - old_size as i64;
        }
        MapResult {
            pos: (pos as i64 + diff) as usize,
            deleted: false,
        }
    }
}

/// The concatenated maps of a whole transaction. Old positions are pushed
/// through every step in order.
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn new() -> Self {
        Mapping::default()
    }

    pub fn push(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn maps(&self) -> &[StepMap] {
        &self.maps
    }

    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        self.maps.iter().fold(pos, |p, m| m.map(p, assoc))
    }

    pub fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult {
        let mut result = MapResult {
            pos,
            deleted: false,
        };
        for map in &self.maps {
            let step = map.map_result(result.pos, assoc);
            result = MapResult {
                pos: step.pos,
                deleted: result.deleted || step.deleted,
            };
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_shifts_later_positions() {
        let map = StepMap::single(5, 0, 3);
        assert_eq!(map.map(4, Assoc::After), 4);
        assert_eq!(map.map(6, Assoc::After), 9);
    }

    #[test]
    fn insertion_point_respects_assoc() {
        let map = StepMap::single(5, 0, 3);
        assert_eq!(map.map(5, Assoc::Before), 5);
        assert_eq!(map.map(5, Assoc::After), 8);
    }

    #[test]
    fn deletion_collapses_interior_positions() {
        let map = StepMap::single(2, 4, 0);
        let result = map.map_result(4, Assoc::After);
        assert_eq!(result.pos, 2);
        assert!(result.deleted);
        // Edges survive.
        assert!(!map.map_result(2, Assoc::After).deleted);
        assert_eq!(map.map(6, Assoc::After), 2);
        assert_eq!(map.map(8, Assoc::After), 4);
    }

    #[test]
    fn mapping_chains_maps_in_order() {
        let mut mapping = Mapping::new();
        mapping.push(StepMap::single(0, 0, 2));
        mapping.push(StepMap::single(10, 3, 0));
        assert_eq!(mapping.map(5, Assoc::After), 7);
        assert_eq!(mapping.map(12, Assoc::After), 10);
    }
}
