mod test_media_state_broadcast;
