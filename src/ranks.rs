use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankTier {
    pub id: &'static str,
    pub level: u8,
    pub name: &'static str,
    pub min_days: u32,
    /// Inclusive upper bound. `None` marks the final, unbounded tier.
    pub max_days: Option<u32>,
    pub reset_allowance: u32,
    pub icon: &'static str,
}

impl RankTier {
    pub fn contains(&self, days: u32) -> bool {
        days >= self.min_days && self.max_days.is_none_or(|max| days <= max)
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_days.is_none()
    }
}

pub const RANKS: [RankTier; 7] = [
    RankTier {
        id: "recruta",
        level: 0,
        name: "Recruta",
        min_days: 0,
        max_days: Some(9),
        reset_allowance: 5,
        icon: "https://c.animaapp.com/wYjpt5p0/img/recruta@2x.png",
    },
    RankTier {
        id: "soldado",
        level: 1,
        name: "Soldado",
        min_days: 10,
        max_days: Some(29),
        reset_allowance: 4,
        icon: "https://c.animaapp.com/wYjpt5p0/img/soldado@2x.png",
    },
    RankTier {
        id: "cabo",
        level: 2,
        name: "Cabo",
        min_days: 30,
        max_days: Some(59),
        reset_allowance: 3,
        icon: "https://c.animaapp.com/wYjpt5p0/img/cabo@2x.png",
    },
    RankTier {
        id: "sargento",
        level: 3,
        name: "Sargento",
        min_days: 60,
        max_days: Some(89),
        reset_allowance: 3,
        icon: "https://c.animaapp.com/wYjpt5p0/img/sargento@2x.png",
    },
    RankTier {
        id: "marechal",
        level: 4,
        name: "Marechal",
        min_days: 90,
        max_days: Some(179),
        reset_allowance: 2,
        icon: "https://c.animaapp.com/wYjpt5p0/img/marechal@2x.png",
    },
    RankTier {
        id: "tenente",
        level: 5,
        name: "Tenente",
        min_days: 180,
        max_days: Some(364),
        reset_allowance: 2,
        icon: "https://c.animaapp.com/wYjpt5p0/img/tenente@2x.png",
    },
    RankTier {
        id: "capitao",
        level: 6,
        name: "Capitão",
        min_days: 365,
        max_days: None,
        reset_allowance: 1,
        icon: "https://c.animaapp.com/wYjpt5p0/img/capit-o@2x.png",
    },
];

pub fn lowest_tier() -> &'static RankTier {
    &RANKS[0]
}

/// Returns the tier whose interval contains `days`. Falls back to the lowest
/// tier instead of failing, since the result feeds display code.
pub fn tier_for(days: u32) -> &'static RankTier {
    RANKS
        .iter()
        .find(|tier| tier.contains(days))
        .unwrap_or_else(lowest_tier)
}

pub fn tier_by_id(id: &str) -> Option<&'static RankTier> {
    RANKS.iter().find(|tier| tier.id == id)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub goal_days: u32,
    pub percentage: f64,
}

pub fn progress_within_tier(days: u32, tier: &RankTier) -> Progress {
    let goal_days = match tier.max_days {
        Some(max) => max.saturating_add(1),
        None => days,
    };

    let percentage = if days == 0 {
        0.0
    } else if tier.is_unbounded() {
        100.0
    } else {
        let span = goal_days.saturating_sub(tier.min_days);
        if span == 0 {
            0.0
        } else {
            let into_tier = f64::from(days) - f64::from(tier.min_days);
            (into_tier / f64::from(span) * 100.0).clamp(0.0, 100.0)
        }
    };

    Progress {
        goal_days,
        percentage,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LadderEntry {
    #[serde(flatten)]
    pub tier: RankTier,
    pub locked: bool,
}

/// Every tier, highest first, with tiers above `current` marked locked.
/// Each tier doubles as a chat room that is readable once unlocked.
pub fn ladder(current: &RankTier) -> Vec<LadderEntry> {
    RANKS
        .iter()
        .rev()
        .map(|tier| LadderEntry {
            tier: *tier,
            locked: tier.level > current.level,
        })
        .collect()
}
