// Which feed items count as "on screen" for autoplay.
//
// Items are stacked at `index * viewport_height`, each one viewport tall.
// The observation root is the viewport with `root_margin` of its height cut
// from the top and from the bottom. An item is active when at least
// `threshold` of its height falls inside that root.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityRules {
    pub threshold: f64,
    pub root_margin: f64,
}

impl Default for VisibilityRules {
    fn default() -> Self {
        VisibilityRules {
            threshold: 0.7,
            root_margin: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    pub index: usize,
    pub active: bool,
}

/// Fraction of `[item_top, item_top + item_height)` inside `[root_top, root_bottom)`.
pub fn intersection_ratio(item_top: f64, item_height: f64, root_top: f64, root_bottom: f64) -> f64 {
    if item_height <= 0.0 {
        return 0.0;
    }
    let top = item_top.max(root_top);
    let bottom = (item_top + item_height).min(root_bottom);
    ((bottom - top).max(0.0) / item_height).min(1.0)
}

impl VisibilityRules {
    pub fn is_active(&self, index: usize, scroll_top: f64, viewport_height: f64) -> bool {
        if viewport_height <= 0.0 {
            return false;
        }
        let margin = viewport_height * self.root_margin;
        let root_top = scroll_top + margin;
        let root_bottom = scroll_top + viewport_height - margin;
        if root_bottom <= root_top {
            return false;
        }

        let item_top = index as f64 * viewport_height;
        let ratio = intersection_ratio(item_top, viewport_height, root_top, root_bottom);
        ratio > 0.0 && ratio >= self.threshold
    }
}

pub struct VisibilityTracker {
    rules: VisibilityRules,
    active: Vec<bool>,
}

impl VisibilityTracker {
    pub fn new(rules: VisibilityRules) -> Self {
        VisibilityTracker {
            rules,
            active: Vec::new(),
        }
    }

    /// Re-evaluate every item for the given scroll position and return the
    /// items whose activation changed since the previous call.
    pub fn update(&mut self, scroll_top: f64, viewport_height: f64, item_count: usize) -> Vec<Activation> {
        self.active.resize(item_count, false);

        let mut changes = Vec::new();
        for (index, flag) in self.active.iter_mut().enumerate() {
            let now_active = self.rules.is_active(index, scroll_top, viewport_height);
            if now_active != *flag {
                *flag = now_active;
                changes.push(Activation {
                    index,
                    active: now_active,
                });
            }
        }
        changes
    }

    /// Forget every flag; the next `update` reports all active items again.
    pub fn reset(&mut self) {
        self.active.clear();
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.active.get(index).copied().unwrap_or(false)
    }

    pub fn active_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.active
            .iter()
            .enumerate()
            .filter_map(|(index, active)| active.then_some(index))
    }
}
