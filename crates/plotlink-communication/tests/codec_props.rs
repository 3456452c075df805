use plotlink_communication::protocol::{parse_fields, DelimiterFramedDecoder, FrameDecoder};
use plotlink_communication::MotionCommand;
use proptest::prelude::*;

fn any_command() -> impl Strategy<Value = MotionCommand> {
    prop_oneof![
        (any::<i32>(), any::<i32>()).prop_map(|(x, y)| MotionCommand::move_to(x, y)),
        (any::<i32>(), any::<i32>()).prop_map(|(x, y)| MotionCommand::set_zero(x, y)),
        Just(MotionCommand::Stop),
        any::<u8>().prop_map(MotionCommand::SetPower),
        any::<u32>().prop_map(MotionCommand::SetSpeed),
    ]
}

proptest! {
    #[test]
    fn encoded_commands_parse_back(cmd in any_command()) {
        let line = cmd.encode();
        prop_assert!(line.ends_with('\n'));
        prop_assert_eq!(line.matches('\n').count(), 1);
        prop_assert_eq!(MotionCommand::parse(&line).unwrap(), cmd);
    }

    #[test]
    fn repeated_line_yields_one_frame(x in 0i32..55_000, y in 0i32..21_000, repeats in 1usize..5) {
        let line = format!(",X={},Y={}\n!", x, y);
        let mut decoder = DelimiterFramedDecoder::new('!', 4096);
        let frames = decoder.feed(&line.repeat(repeats));
        prop_assert_eq!(frames.len(), 1);
        prop_assert_eq!(frames[0].x(), Some(i64::from(x)));
    }

    #[test]
    fn parsed_fields_have_keys_and_trimmed_values(line in "[A-Z=, 0-9]{0,40}") {
        let frame = parse_fields(&line);
        for (key, value) in frame.iter() {
            prop_assert!(!key.is_empty());
            prop_assert_eq!(value, value.trim());
        }
    }
}
