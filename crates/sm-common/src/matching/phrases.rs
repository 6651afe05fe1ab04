/// Wording that marks a listing as open to everyone regardless of program.
pub const UNIVERSAL_PHRASES: &[&str] = &[
    "all students",
    "open to all",
    "open to everyone",
    "any field",
    "any program",
    "any major",
    "all fields of study",
    "all majors",
    "all programs",
    "no requirements",
    "no specific requirements",
    "no restrictions",
    "regardless of field",
    "regardless of program",
];

/// Low-barrier entry wording. Only counts towards a universal match when a
/// region is also mentioned.
pub const EASY_ENTRY_PHRASES: &[&str] = &[
    "random draw",
    "random selection",
    "no essay",
    "no essays",
    "no essay required",
    "no grades",
    "no gpa",
    "no minimum gpa",
    "no gpa requirement",
    "easy to apply",
    "easy application",
    "sweepstakes",
    "enter to win",
];
