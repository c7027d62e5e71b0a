pub mod events;
pub mod feedback;
pub mod flows;
pub mod health;
pub mod one_on_ones;
pub mod surveys;
