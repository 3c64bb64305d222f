/// Trail passes admit at most this many guests.
pub const MAX_TRAIL_GUESTS: u32 = 4;

/// Upper bound on guests for any other facility type.
pub const MAX_GUESTS_PER_PASS: u32 = 50;

/// Max length of any free-text request field (names, email, phone).
pub const MAX_FIELD_LEN: usize = 256;

/// Max bytes in one request line on the wire.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Registration numbers are exactly this many Crockford base32 characters.
pub const REGISTRATION_NUMBER_LEN: usize = 10;

/// Booking-ahead overrides beyond this are treated as misconfiguration.
pub const MAX_BOOKING_DAYS_AHEAD: u32 = 366;

/// Largest encoded WAL entry. Longer length prefixes are read as corruption.
pub const MAX_WAL_ENTRY_LEN: usize = 1024 * 1024;
