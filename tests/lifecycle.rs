use std::os::raw::c_void;
use std::sync::mpsc;

use threading_core::{create, create_with, destroy, wait, wait_for, ErrorCode, ThreadHandle};

struct Opaque(*mut c_void);

// the address is only compared, never dereferenced
unsafe impl Send for Opaque {}

#[test]
fn returned_pointer_matches_the_state_pointer() {
	let mut storage = 12u32;
	let address = std::ptr::addr_of_mut!(storage).cast::<c_void>();

	let handle = create_with(|state: Opaque| state, Opaque(address)).unwrap();
	let returned = handle.wait().unwrap().returned().unwrap();

	assert_eq!(returned.0, address);
	assert_eq!(storage, 12);
}

#[test]
fn plain_create_matches_unit_state() {
	let mut plain = Some(create(|| 3).unwrap());
	let mut with_unit = Some(create_with(|()| 3, ()).unwrap());

	assert_eq!(wait_for(&mut plain).unwrap().returned(), Some(3));
	assert_eq!(wait_for(&mut with_unit).unwrap().returned(), Some(3));
}

#[test]
fn empty_slot_has_nothing_to_wait_for() {
	let mut slot: Option<ThreadHandle<u8>> = None;

	assert_eq!(wait(&mut slot), ErrorCode::NO_THREAD);
	assert_eq!(wait_for(&mut slot).unwrap_err(), ErrorCode::NO_THREAD);
	assert!(slot.is_none());
}

#[test]
fn destroying_twice_is_harmless() {
	let (tx, rx) = mpsc::channel::<()>();
	let mut slot = Some(create(move || rx.recv().ok()).unwrap());

	assert_eq!(destroy(&mut slot), ErrorCode::SUCCESS);
	assert_eq!(destroy(&mut slot), ErrorCode::SUCCESS);
	assert_eq!(wait(&mut slot), ErrorCode::NO_THREAD);

	drop(tx);
}

#[test]
fn already_finished_threads_are_waited_on_immediately() {
	let handle = create(|| 1).unwrap();
	while !handle.is_finished() {
		std::thread::yield_now();
	}

	assert_eq!(handle.wait().unwrap().returned(), Some(1));
}
