use std::collections::BTreeSet;

use crate::BranchId;

pub const MAIN_BRANCH_COLOR: &str = "#3b82f6";

/// Colors handed out to forked branches, in order.
pub const BRANCH_PALETTE: [&str; 8] = [
    "#f97316", "#10b981", "#a855f7", "#ef4444", "#eab308", "#14b8a6", "#ec4899", "#84cc16",
];

/// Picks the display color for `branch` given the colors already held by
/// other live branches.
///
/// `main` always gets [`MAIN_BRANCH_COLOR`]. Any other branch gets the first
/// palette color nobody holds; once every palette color is taken, colors are
/// reused by index.
pub fn branch_color(branch: &BranchId, assigned: &BTreeSet<String>) -> String {
    if branch.is_main() {
        return MAIN_BRANCH_COLOR.to_string();
    }
    if let Some(free) = BRANCH_PALETTE
        .iter()
        .find(|color| !assigned.contains(**color))
    {
        return free.to_string();
    }
    let in_use = assigned
        .iter()
        .filter(|c| c.as_str() != MAIN_BRANCH_COLOR)
        .count();
    BRANCH_PALETTE[in_use % BRANCH_PALETTE.len()].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(colors: &[&str]) -> BTreeSet<String> {
        colors.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_main_is_fixed() {
        let assigned = set(&[MAIN_BRANCH_COLOR, BRANCH_PALETTE[0]]);
        assert_eq!(branch_color(&BranchId::main(), &assigned), MAIN_BRANCH_COLOR);
    }

    #[test]
    fn test_first_unused_color() {
        let branch = BranchId::new("branch-v1");
        assert_eq!(branch_color(&branch, &set(&[])), BRANCH_PALETTE[0]);
        assert_eq!(
            branch_color(&branch, &set(&[MAIN_BRANCH_COLOR, BRANCH_PALETTE[0]])),
            BRANCH_PALETTE[1]
        );
        assert_eq!(
            branch_color(&branch, &set(&[BRANCH_PALETTE[0], BRANCH_PALETTE[2]])),
            BRANCH_PALETTE[1]
        );
    }

    #[test]
    fn test_exhausted_palette_reuses_by_index() {
        let mut assigned: BTreeSet<String> = BRANCH_PALETTE.iter().map(|c| c.to_string()).collect();
        assigned.insert(MAIN_BRANCH_COLOR.to_string());
        let color = branch_color(&BranchId::new("branch-late"), &assigned);
        assert_eq!(color, BRANCH_PALETTE[0]);
    }

    #[test]
    fn test_is_pure() {
        let assigned = set(&[BRANCH_PALETTE[0]]);
        let branch = BranchId::new("branch-v7");
        assert_eq!(branch_color(&branch, &assigned), branch_color(&branch, &assigned));
    }
}
