use secure_counter::console::{self, Command, ConsoleError, Reply};
use secure_counter::{Config, SecureCounter};
use serial_test::serial;
use std::io::Cursor;
use std::sync::atomic::AtomicBool;

#[test]
fn parses_commands_with_or_without_group_word() {
    assert_eq!("get".parse::<Command>().unwrap(), Command::Get);
    assert_eq!("counter get".parse::<Command>().unwrap(), Command::Get);
    assert_eq!("  counter   set 250 ".parse::<Command>().unwrap(), Command::Set("250".into()));
    assert_eq!("set abc".parse::<Command>().unwrap(), Command::Set("abc".into()));
    assert_eq!("counter attack".parse::<Command>().unwrap(), Command::Attack);
    assert_eq!("help".parse::<Command>().unwrap(), Command::Help);
    assert_eq!("counter".parse::<Command>().unwrap(), Command::Help);
    assert_eq!("".parse::<Command>().unwrap(), Command::Help);
    assert_eq!("quit".parse::<Command>().unwrap(), Command::Quit);
    assert_eq!("exit".parse::<Command>().unwrap(), Command::Quit);
}

#[test]
fn rejects_bad_arity_and_unknown_verbs() {
    assert!(matches!("get now".parse::<Command>(), Err(ConsoleError::Usage(_))));
    assert!(matches!("set".parse::<Command>(), Err(ConsoleError::Usage(_))));
    assert!(matches!("set 1 2".parse::<Command>(), Err(ConsoleError::Usage(_))));
    assert!(matches!("attack twice".parse::<Command>(), Err(ConsoleError::Usage(_))));
    match "reboot".parse::<Command>() {
        Err(ConsoleError::Unknown(verb)) => assert_eq!(verb, "reboot"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
#[serial]
fn execute_reports_status_and_errors() {
    let system = SecureCounter::start(Config::default()).unwrap();

    match console::execute(&system, Command::Get).unwrap() {
        Reply::Print(text) => {
            assert!(text.starts_with("period=100 ms, seq="), "{text}");
            assert!(text.contains("consumer=running"), "{text}");
        }
        Reply::Quit => panic!("get must not quit"),
    }

    let err = console::execute(&system, Command::Set("5".into())).unwrap_err();
    assert_eq!(err.to_string(), "invalid <ms> 5 (10..10000)");

    assert_eq!(
        console::execute(&system, Command::Set("250".into())).unwrap(),
        Reply::Print("period set to 250 ms".into())
    );
    assert_eq!(system.status().period_ms, 250);

    assert_eq!(console::execute(&system, Command::Quit).unwrap(), Reply::Quit);
}

#[test]
#[serial]
fn scripted_session() {
    let system = SecureCounter::start(Config::default()).unwrap();
    let input = Cursor::new("get\nset abc\n\nattack\ncounter get\nquit\nget\n");
    let mut output = Vec::new();
    let running = AtomicBool::new(true);

    console::run(&system, input, &mut output, &running).unwrap();
    let text = String::from_utf8(output).unwrap();

    assert!(text.contains("error: invalid <ms> \"abc\""), "{text}");
    assert!(text.contains("attempting unauthorized access to secret_q..."), "{text}");
    assert!(text.contains("consumer_user terminated: permission fault"), "{text}");
    assert!(text.contains("consumer=faulted"), "{text}");
    // The `get` after `quit` is never read.
    assert_eq!(text.matches("period=").count(), 2, "{text}");
}

#[test]
#[serial]
fn stops_when_running_flag_clears() {
    let system = SecureCounter::start(Config::default()).unwrap();
    let mut output = Vec::new();
    let running = AtomicBool::new(false);

    console::run(&system, Cursor::new("get\n"), &mut output, &running).unwrap();
    assert!(output.is_empty());
}
