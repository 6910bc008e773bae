mod arrival_departure;
mod keys;
mod model_error;
mod position_match;
mod run_times;
mod schedule_adherence;
mod service_type;
mod stop_path;
mod travel_time_info;
mod trip_config;

pub use arrival_departure::{validate_trip_sequence, ArrivalDeparture, ArrivalDepartureKind};
pub use keys::{RunTimeRouteKey, RunTimeStopKey, TripOccurrenceKey, TripStopPathKey};
pub use model_error::ModelError;
pub use position_match::PositionMatch;
pub use run_times::{RunTimesForRoutes, RunTimesForStops};
pub use schedule_adherence::{
    ScheduleAdherence, ScheduleAdherenceCalculator, ScheduledTimeAdherence,
};
pub use service_type::{CalendarServiceTypeClassifier, ServiceType, ServiceTypeClassifier};
pub use stop_path::{number_of_segments, StopPath};
pub use travel_time_info::{TravelTimeInfo, TravelTimeInfoMap};
pub use trip_config::{
    InMemoryTripConfigProvider, NextTripStart, TripConfig, TripConfigProvider,
};
