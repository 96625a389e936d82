use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Habit {
    pub id: &'static str,
    pub label: &'static str,
}

pub const HABITS: [Habit; 5] = [
    Habit { id: "masturbacao", label: "Masturbação" },
    Habit { id: "pornografia", label: "Pornografia" },
    Habit { id: "fumar", label: "Fumar" },
    Habit { id: "bebida", label: "Bebida Alcoólica" },
    Habit { id: "outro", label: "Outro" },
];

pub fn habit_by_id(id: &str) -> Option<&'static Habit> {
    HABITS.iter().find(|habit| habit.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_id() {
        assert_eq!(habit_by_id("fumar").map(|h| h.label), Some("Fumar"));
        assert!(habit_by_id("jogos").is_none());
    }
}
