mod test_glare;
mod test_session_isolation;
