use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: &'static str,
    pub glyph: &'static str,
    pub multiplier: u32,
}

/// The reel strip. Every reel draws uniformly from this table.
pub const SYMBOLS: [Symbol; 9] = [
    Symbol { name: "Cherry", glyph: "🍒", multiplier: 2 },
    Symbol { name: "Lemon", glyph: "🍋", multiplier: 3 },
    Symbol { name: "Orange", glyph: "🍊", multiplier: 4 },
    Symbol { name: "Grapes", glyph: "🍇", multiplier: 5 },
    Symbol { name: "Watermelon", glyph: "🍉", multiplier: 5 },
    Symbol { name: "Bell", glyph: "🔔", multiplier: 8 },
    Symbol { name: "Diamond", glyph: "💎", multiplier: 10 },
    Symbol { name: "Seven", glyph: "7️⃣", multiplier: 15 },
    Symbol { name: "Jackpot", glyph: "🎰", multiplier: 20 },
];

/// Three-of-a-kind pays the symbol multiplier times this
pub const THREE_OF_A_KIND_FACTOR: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotsOutcome {
    /// Indexes into `SYMBOLS`
    pub reels: [usize; 3],
    pub symbols: [String; 3],
    pub multiplier: u32,
    pub stake: f64,
    pub payout: f64,
}

/// Draws three reel positions independently and uniformly
pub fn spin<R: Rng + ?Sized>(rng: &mut R) -> [usize; 3] {
    [
        rng.gen_range(0..SYMBOLS.len()),
        rng.gen_range(0..SYMBOLS.len()),
        rng.gen_range(0..SYMBOLS.len()),
    ]
}

/// Payout multiplier for a set of reels.
///
/// Any pair pays the multiplier of the middle reel, whichever two reels
/// actually matched. For a 0/2 pair that is the odd symbol's multiplier.
pub fn multiplier(reels: [usize; 3]) -> u32 {
    let [a, b, c] = reels;
    if a == b && b == c {
        return SYMBOLS[a].multiplier * THREE_OF_A_KIND_FACTOR;
    }
    if a == b || b == c || a == c {
        return SYMBOLS[b].multiplier;
    }
    0
}

pub fn resolve(reels: [usize; 3], stake: f64) -> SlotsOutcome {
    let multiplier = multiplier(reels);
    SlotsOutcome {
        reels,
        symbols: reels.map(|i| SYMBOLS[i].glyph.to_string()),
        multiplier,
        stake,
        payout: stake * f64::from(multiplier),
    }
}
