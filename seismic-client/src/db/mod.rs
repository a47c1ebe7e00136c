pub mod seismic_record_queries;
