//! Play-type token decoding.
//!
//! A play-type token is a short run of glyphs such as `四上南喰赤`. Each
//! attribute category is tested independently by substring membership, so
//! glyph order never matters and unknown glyphs are ignored.

use crate::model::{PlayTypeFlags, RoundLength, SkillTier};

const PLAYER_COUNTS: &[(char, u8)] = &[('三', 3), ('四', 4)];

// First match wins when a token carries several tier glyphs.
const SKILL_TIERS: &[(char, SkillTier)] = &[
    ('般', SkillTier::None),
    ('上', SkillTier::Upper),
    ('特', SkillTier::Special),
    ('鳳', SkillTier::Phoenix),
    ('技', SkillTier::Other),
    ('若', SkillTier::Other),
    ('銀', SkillTier::Other),
    ('琥', SkillTier::Other),
    ('孔', SkillTier::Other),
];

const ROUND_LENGTHS: &[(char, RoundLength)] =
    &[('東', RoundLength::EastOnly), ('南', RoundLength::EastSouth)];

const OPEN_TANYAO: char = '喰';
const RED_FIVES: char = '赤';
const RAPID: char = '速';
const CELEBRATION_CHIPS: char = '祝';

fn first_match<T: Copy>(token: &str, table: &[(char, T)]) -> Option<T> {
    table
        .iter()
        .find(|(glyph, _)| token.contains(*glyph))
        .map(|(_, value)| *value)
}

/// Decode a play-type token into its rule attributes.
///
/// Never fails: a token with no known glyph yields empty flags.
#[must_use]
pub fn decode_play_type(token: &str) -> PlayTypeFlags {
    PlayTypeFlags {
        player_count: first_match(token, PLAYER_COUNTS),
        skill_tier: first_match(token, SKILL_TIERS),
        round_length: first_match(token, ROUND_LENGTHS),
        open_tanyao: token.contains(OPEN_TANYAO),
        red_fives: token.contains(RED_FIVES),
        rapid: token.contains(RAPID),
        celebration_chips: token.contains(CELEBRATION_CHIPS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_token() {
        let flags = decode_play_type("四鳳南喰赤速");
        assert_eq!(flags.player_count, Some(4));
        assert_eq!(flags.skill_tier, Some(SkillTier::Phoenix));
        assert_eq!(flags.round_length, Some(RoundLength::EastSouth));
        assert!(flags.open_tanyao);
        assert!(flags.red_fives);
        assert!(flags.rapid);
        assert!(!flags.celebration_chips);
    }

    #[test]
    fn test_partial_token_leaves_rest_unset() {
        let flags = decode_play_type("四南");
        assert_eq!(
            flags,
            PlayTypeFlags {
                player_count: Some(4),
                round_length: Some(RoundLength::EastSouth),
                ..PlayTypeFlags::default()
            }
        );
    }

    #[test]
    fn test_order_independent() {
        assert_eq!(decode_play_type("喰赤南上三"), decode_play_type("三上南喰赤"));
    }

    #[test]
    fn test_unknown_glyphs_yield_empty_flags() {
        assert!(decode_play_type("－－").is_empty());
        assert!(decode_play_type("").is_empty());
    }

    #[test]
    fn test_lower_tier_glyph_wins_within_category() {
        // Same precedence as the glyph table: 般 is checked before 上.
        assert_eq!(decode_play_type("上般").skill_tier, Some(SkillTier::None));
        assert!(decode_play_type("三祝").celebration_chips);
    }
}
