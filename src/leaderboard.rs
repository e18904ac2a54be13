//! Text leaderboard from pasted `Team,Placement,Kills` lines.

use std::fmt::Write;

/// Rows kept in the rendered table.
pub const LEADERBOARD_SIZE: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub team: String,
    pub placement: i64,
    pub kills: i64,
}

impl Standing {
    pub fn total(&self) -> i64 {
        self.placement + self.kills
    }
}

/// One standing per non-blank line. Missing or non-numeric points count as 0.
pub fn parse_standings(data: &str) -> Vec<Standing> {
    data.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut fields = line.split(',').map(str::trim);
            let team = fields.next().unwrap_or_default().to_string();
            let placement = points(fields.next());
            let kills = points(fields.next());
            Standing {
                team,
                placement,
                kills,
            }
        })
        .collect()
}

fn points(field: Option<&str>) -> i64 {
    field.and_then(|f| f.parse().ok()).unwrap_or(0)
}

/// Sorted by total, highest first. Ties keep their input order.
pub fn rank(mut standings: Vec<Standing>) -> Vec<Standing> {
    standings.sort_by(|a, b| b.total().cmp(&a.total()));
    standings.truncate(LEADERBOARD_SIZE);
    standings
}

pub fn render(scrim: &str, standings: &[Standing]) -> String {
    let width = standings
        .iter()
        .map(|s| s.team.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);
    let mut table = String::new();
    let _ = writeln!(table, "🏆 {} - Leaderboard", scrim);
    let _ = writeln!(table, "```");
    let _ = writeln!(
        table,
        "{:<6} {:<width$} {:>9} {:>5} {:>5}",
        "Rank", "Team", "Placement", "Kills", "Total"
    );
    for (i, standing) in standings.iter().enumerate() {
        let marker = match i {
            0 => "🥇",
            1 => "🥈",
            2 => "🥉",
            _ => "",
        };
        let _ = writeln!(
            table,
            "{:<6} {:<width$} {:>9} {:>5} {:>5}",
            format!("#{}{}", i + 1, marker),
            standing.team,
            standing.placement,
            standing.kills,
            standing.total()
        );
    }
    table.push_str("```");
    table
}
