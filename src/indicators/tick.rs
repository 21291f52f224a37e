/// Minimum price increment of the traded contract (ES/MES quarter point)
pub const TICK_SIZE: f64 = 0.25;

/// Round a price to the nearest quarter point
///
/// Ties go to the even quarter (`round_ties_even`), so x.125 rounds to x.0
/// and x.375 rounds to x.5.
pub fn round_to_tick(price: f64) -> f64 {
    round_to_increment(price, TICK_SIZE)
}

/// Round a price to the nearest multiple of `increment`
pub fn round_to_increment(price: f64, increment: f64) -> f64 {
    if increment <= 0.0 || !price.is_finite() {
        return price;
    }
    (price / increment).round_ties_even() * increment
}
