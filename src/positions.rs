/// Roster roles for the current season, keyed by player tag.
const PLAYER_POSITIONS: &[(&str, &str)] = &[
    // Boston Breach
    ("Cammy", "AR"),
    ("Snoopy", "SMG"),
    ("Purj", "SMG"),
    ("Nastie", "Flex"),
    // Carolina Royal Ravens
    ("SlasheR", "AR"),
    ("Nero", "SMG"),
    ("Lurqxx", "SMG"),
    ("Craze", "Flex"),
    // Cloud9 New York
    ("Mack", "AR"),
    ("Afro", "SMG"),
    ("Beans", "SMG"),
    ("Vivid", "Flex"),
    // FaZe Vegas
    ("Drazah", "AR"),
    ("Abuzah", "SMG"),
    ("04", "SMG"),
    ("Simp", "Flex"),
    // G2 Minnesota
    ("Skyz", "AR"),
    ("Estreal", "SMG"),
    ("Kremp", "SMG"),
    ("Mamba", "Flex"),
    // Los Angeles Thieves
    ("aBeZy", "AR"),
    ("HyDra", "SMG"),
    ("Scrap", "SMG"),
    ("Kenny", "Flex"),
    // Miami Heretics
    ("MettalZ", "AR"),
    ("Traixx", "SMG"),
    ("SupeR", "SMG"),
    ("RenKoR", "Flex"),
    // OpTic Texas
    ("Dashy", "AR"),
    ("Shotzzy", "SMG"),
    ("Huke", "SMG"),
    ("Mercules", "Flex"),
    // Paris Gentle Mates
    ("Envoy", "AR"),
    ("Ghosty", "SMG"),
    ("Neptune", "SMG"),
    ("Sib", "Flex"),
    // Riyadh Falcons
    ("Cellium", "AR"),
    ("Exnid", "SMG"),
    ("KiSMET", "SMG"),
    ("Pred", "Flex"),
    // Toronto KOI
    ("ReeaL", "AR"),
    ("CleanX", "SMG"),
    ("JoeDeceives", "SMG"),
    ("Insight", "Flex"),
    // Vancouver Surge
    ("Abe", "AR"),
    ("Gwinn", "SMG"),
    ("Lunarz", "SMG"),
    ("Lqgend", "Flex"),
];

pub fn player_position(player_tag: &str) -> Option<&'static str> {
    PLAYER_POSITIONS
        .iter()
        .find(|(tag, _)| *tag == player_tag)
        .map(|(_, position)| *position)
}
