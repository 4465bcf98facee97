//! Real Thane / Mumbai coordinates used across integration tests.

#[derive(Debug, Clone, Copy)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

// ============================================================================
// Depots
// ============================================================================

pub const DEPOT_WAGLE_ESTATE: Location = Location::new("Wagle Estate depot", 19.2400, 72.9800);
pub const DEPOT_BHIWANDI: Location = Location::new("Bhiwandi warehouse", 19.2813, 73.0483);

// ============================================================================
// Thane West
// ============================================================================

pub const MAJIWADA: Location = Location::new("Majiwada", 19.2429, 72.9825);
pub const VARTAK_NAGAR: Location = Location::new("Vartak Nagar", 19.2180, 72.9655);
pub const THANE_STATION: Location = Location::new("Thane station", 19.1860, 72.9750);
pub const MANPADA: Location = Location::new("Manpada", 19.2343, 72.9710);
pub const KOLSHET: Location = Location::new("Kolshet Road", 19.2245, 72.9880);
pub const GHODBUNDER: Location = Location::new("Ghodbunder Road", 19.2600, 72.9700);

// ============================================================================
// Further out
// ============================================================================

pub const MULUND: Location = Location::new("Mulund West", 19.1726, 72.9425);
pub const AIROLI: Location = Location::new("Airoli", 19.1590, 72.9986);
pub const BANDRA: Location = Location::new("Bandra", 19.0596, 72.8295);

pub fn thane_west() -> Vec<Location> {
    vec![MAJIWADA, VARTAK_NAGAR, THANE_STATION, MANPADA, KOLSHET, GHODBUNDER]
}
