pub mod daily_energy_queries;
